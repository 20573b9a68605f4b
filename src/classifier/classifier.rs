use std::sync::Arc;

use ndarray::{concatenate, Array1, Array4, Axis};

use super::backbone::FeatureExtractor;
use super::error::ClassifierError;
use super::fusion::FusionHead;
use crate::models::FusionSpec;

/// A two-backbone fusion classifier: each backbone independently turns the
/// input batch into a feature vector, the vectors are concatenated, and the
/// fusion head maps the result to raw class scores.
///
/// # Thread Safety
///
/// The classifier is immutable after construction: the ONNX sessions and the
/// head weights are read-only, so it can be shared across threads behind an
/// `Arc`. First construction pays the full load cost; all later users reuse
/// the same instance.
pub struct FusionClassifier {
    pub(crate) backbone_a: Box<dyn FeatureExtractor>,
    pub(crate) backbone_b: Box<dyn FeatureExtractor>,
    pub(crate) head: FusionHead,
    pub(crate) spec: FusionSpec,
    pub(crate) labels: Arc<Vec<String>>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<FusionClassifier>();
    }
};

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone)]
pub struct ClassifierInfo {
    /// Number of classes the head produces scores for
    pub num_classes: usize,
    /// Class labels in output-vector order
    pub labels: Vec<String>,
    /// Feature vector length of backbone A
    pub feature_dim_a: usize,
    /// Feature vector length of backbone B
    pub feature_dim_b: usize,
    /// Side length of the square network input, in pixels
    pub input_size: u32,
}

impl FusionClassifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Class labels in the ordinal order of the output vector
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.head.num_classes()
    }

    /// Side length of the square input the backbones were trained on
    pub fn input_size(&self) -> u32 {
        self.spec.input_size
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            num_classes: self.num_classes(),
            labels: self.labels.as_ref().clone(),
            feature_dim_a: self.backbone_a.feature_dim(),
            feature_dim_b: self.backbone_b.feature_dim(),
            input_size: self.spec.input_size,
        }
    }

    /// Runs a forward pass on a normalized single-image NCHW batch and
    /// returns the raw class scores (logits).
    ///
    /// Pure function of the batch and the frozen weights: dropout is
    /// disabled and no internal state is mutated. The batch is expected to
    /// match the normalization contract the backbones were trained with; the
    /// network performs no input validation, so a violation degrades
    /// accuracy rather than raising an error.
    pub fn forward(&self, batch: &Array4<f32>) -> Result<Array1<f32>, ClassifierError> {
        let features_a = self.backbone_a.extract(batch)?;
        let features_b = self.backbone_b.extract(batch)?;

        let fused = concatenate(Axis(0), &[features_a.view(), features_b.view()]).map_err(
            |e| ClassifierError::AnalysisError(format!("Failed to fuse feature vectors: {}", e)),
        )?;

        self.head.forward(&fused.view())
    }
}
