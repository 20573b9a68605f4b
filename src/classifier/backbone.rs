use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use log::info;
use ndarray::{Array1, Array4};
use ort::session::Session;
use ort::value::Tensor;

use super::error::ClassifierError;
use crate::runtime::{create_session_builder, RuntimeConfig};

/// A pretrained image backbone with its native classification head removed,
/// reduced to the one capability fusion needs: turning a normalized image
/// batch into a fixed-length feature vector.
pub trait FeatureExtractor: Send + Sync {
    /// Length of the feature vector this backbone produces
    fn feature_dim(&self) -> usize;

    /// Runs the backbone on a single-image NCHW batch and returns the pooled
    /// feature vector.
    fn extract(&self, batch: &Array4<f32>) -> Result<Array1<f32>, ClassifierError>;
}

/// Feature extractor backed by an ONNX graph.
///
/// The graph is expected to take one NCHW float input and emit one output
/// that flattens to `feature_dim` values per image. The input name is read
/// from the graph rather than hard-coded, since exporters disagree on it.
pub struct OnnxBackbone {
    name: String,
    session: Arc<Session>,
    input_name: String,
    feature_dim: usize,
}

impl OnnxBackbone {
    pub fn load(
        name: impl Into<String>,
        model_path: &Path,
        feature_dim: usize,
        runtime_config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let name = name.into();
        if !model_path.exists() {
            return Err(ClassifierError::BuildError(format!(
                "Backbone file not found: {}",
                model_path.display()
            )));
        }

        let session = create_session_builder(runtime_config)?
            .commit_from_file(model_path)?;
        Self::validate_graph(&name, &session)?;

        let input_name = session.inputs[0].name.clone();
        info!(
            "Loaded backbone '{}' from {:?} (input '{}', {} features)",
            name, model_path, input_name, feature_dim
        );

        Ok(Self {
            name,
            session: Arc::new(session),
            input_name,
            feature_dim,
        })
    }

    fn validate_graph(name: &str, session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.len() != 1 {
            return Err(ClassifierError::StructuralMismatch(format!(
                "Backbone '{}' must have exactly 1 input (pixel batch), found {}",
                name,
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::StructuralMismatch(format!(
                "Backbone '{}' must have at least 1 output for features",
                name
            )));
        }
        Ok(())
    }
}

impl FeatureExtractor for OnnxBackbone {
    fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    fn extract(&self, batch: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        let input_dyn = batch.clone().into_dyn();
        let pixels = input_dyn.as_standard_layout();

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(&pixels).map_err(|e| {
                ClassifierError::AnalysisError(format!(
                    "Failed to create input tensor for '{}': {}",
                    self.name, e
                ))
            })?,
        );

        let outputs = self.session.run(input_tensors).map_err(|e| {
            ClassifierError::AnalysisError(format!(
                "Backbone '{}' forward pass failed: {}",
                self.name, e
            ))
        })?;
        let features = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            ClassifierError::AnalysisError(format!(
                "Failed to extract '{}' features: {}",
                self.name, e
            ))
        })?;

        // Output is [1, feature_dim] (some exporters keep trailing 1x1
        // spatial dims); flatten and check the length instead of the rank.
        let flat = Array1::from_iter(features.iter().cloned());
        if flat.len() != self.feature_dim {
            return Err(ClassifierError::StructuralMismatch(format!(
                "Backbone '{}' produced {} features, configured for {}",
                self.name,
                flat.len(),
                self.feature_dim
            )));
        }

        Ok(flat)
    }
}
