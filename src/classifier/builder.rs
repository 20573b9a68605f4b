use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use super::backbone::OnnxBackbone;
use super::classifier::FusionClassifier;
use super::error::ClassifierError;
use super::fusion::FusionHead;
use crate::models::{BuiltinModel, FusionSpec};
use crate::runtime::RuntimeConfig;
use crate::weights::WeightStore;

/// A builder for constructing a FusionClassifier with a fluent interface.
#[derive(Default)]
pub struct ClassifierBuilder {
    backbone_a_path: Option<PathBuf>,
    backbone_b_path: Option<PathBuf>,
    fusion_head_path: Option<PathBuf>,
    spec: Option<FusionSpec>,
    runtime_config: RuntimeConfig,
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration for ONNX model execution
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Selects a built-in model whose weights are already in the default
    /// cache. Shorthand for [`Self::with_model_from`] with a default store.
    ///
    /// # Errors
    /// Fails if weight paths are already set or if the model's artifacts are
    /// not downloaded (use `WeightStore::download` first).
    pub fn with_model(self, model: BuiltinModel) -> Result<Self, ClassifierError> {
        let store = WeightStore::new_default().map_err(|e| {
            ClassifierError::BuildError(format!("Failed to create weight store: {}", e))
        })?;
        self.with_model_from(&store, model)
    }

    /// Selects a built-in model resolved through the caller's weight store,
    /// so a non-default cache directory or custom transport carries through
    /// to the built classifier.
    pub fn with_model_from(
        mut self,
        store: &WeightStore,
        model: BuiltinModel,
    ) -> Result<Self, ClassifierError> {
        if self.spec.is_some() {
            return Err(ClassifierError::BuildError(
                "Model weights already set".to_string(),
            ));
        }

        if !store.is_downloaded(model) {
            return Err(ClassifierError::AcquisitionError(format!(
                "Weights for '{:?}' are not downloaded. Download them first using WeightStore::download()",
                model
            )));
        }

        self.backbone_a_path = Some(store.backbone_a_path(model));
        self.backbone_b_path = Some(store.backbone_b_path(model));
        self.fusion_head_path = Some(store.fusion_head_path(model));
        self.spec = Some(model.spec());
        Ok(self)
    }

    /// Sets custom weight files and the architecture configuration they
    /// belong to. Paths must exist; dimensions come from `spec` so swapped
    /// backbones only need a different configuration, not different code.
    pub fn with_custom_model(
        mut self,
        backbone_a_path: impl Into<PathBuf>,
        backbone_b_path: impl Into<PathBuf>,
        fusion_head_path: impl Into<PathBuf>,
        spec: FusionSpec,
    ) -> Result<Self, ClassifierError> {
        if self.spec.is_some() {
            return Err(ClassifierError::BuildError(
                "Model weights already set".to_string(),
            ));
        }

        let paths = [
            backbone_a_path.into(),
            backbone_b_path.into(),
            fusion_head_path.into(),
        ];
        for path in &paths {
            if !path.exists() {
                return Err(ClassifierError::BuildError(format!(
                    "Weight file not found: {}",
                    path.display()
                )));
            }
        }

        let [a, b, head] = paths;
        self.backbone_a_path = Some(a);
        self.backbone_b_path = Some(b);
        self.fusion_head_path = Some(head);
        self.spec = Some(spec);
        Ok(self)
    }

    /// Builds and returns the final FusionClassifier instance.
    ///
    /// # Errors
    /// - `BuildError` if no model was selected
    /// - `ConfigError` if the label set is empty
    /// - `StructuralMismatch` if any weight file disagrees with the
    ///   configured architecture
    /// - `AcquisitionError` if a weight file cannot be read
    pub fn build(self) -> Result<FusionClassifier, ClassifierError> {
        let spec = self
            .spec
            .ok_or_else(|| ClassifierError::BuildError("Model weights must be set".to_string()))?;
        if spec.labels.is_empty() {
            return Err(ClassifierError::ConfigError(
                "Label set cannot be empty".to_string(),
            ));
        }

        let backbone_a_path = self
            .backbone_a_path
            .ok_or_else(|| ClassifierError::BuildError("Backbone A path not set".to_string()))?;
        let backbone_b_path = self
            .backbone_b_path
            .ok_or_else(|| ClassifierError::BuildError("Backbone B path not set".to_string()))?;
        let fusion_head_path = self
            .fusion_head_path
            .ok_or_else(|| ClassifierError::BuildError("Fusion head path not set".to_string()))?;

        let backbone_a = OnnxBackbone::load(
            "backbone A",
            &backbone_a_path,
            spec.feature_dim_a,
            &self.runtime_config,
        )?;
        let backbone_b = OnnxBackbone::load(
            "backbone B",
            &backbone_b_path,
            spec.feature_dim_b,
            &self.runtime_config,
        )?;

        let head_bytes = fs::read(&fusion_head_path).map_err(|e| {
            ClassifierError::AcquisitionError(format!(
                "Failed to read fusion head file {}: {}",
                fusion_head_path.display(),
                e
            ))
        })?;
        let head = FusionHead::from_safetensors(
            &head_bytes,
            spec.fused_dim(),
            spec.hidden_dim,
            spec.num_classes(),
        )?;
        info!(
            "Fusion head loaded: {} -> {} -> {} (eval mode)",
            head.fused_dim(),
            spec.hidden_dim,
            head.num_classes()
        );

        let labels = Arc::new(spec.labels.clone());
        Ok(FusionClassifier {
            backbone_a: Box::new(backbone_a),
            backbone_b: Box::new(backbone_b),
            head,
            spec,
            labels,
        })
    }
}
