//! Skin-lesion image classification by fusing two pretrained ONNX backbones.
//!
//! Two feature extractors (a DenseNet-121 and an EfficientNet-B0 graph, each
//! with its native classification head removed) run on the same preprocessed
//! image; their feature vectors are concatenated and a small trained head
//! maps the result to class probabilities. Weights are downloaded once and
//! cached locally.
//!
//! # Basic Usage
//!
//! ```no_run
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use dermalens::{BuiltinModel, FusionClassifier, InferenceService, WeightStore};
//!
//! let store = WeightStore::new_default()?;
//! store.ensure_downloaded(BuiltinModel::HybridSkinV1).await?;
//!
//! let classifier = Arc::new(
//!     FusionClassifier::builder()
//!         .with_model(BuiltinModel::HybridSkinV1)?
//!         .build()?,
//! );
//!
//! let service = InferenceService::new(classifier);
//! let image = image::open("lesion.jpg")?;
//! let report = service.diagnose(&image)?;
//! println!("{:?}", report.diagnosis.verdict);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! The classifier is immutable after construction and can be shared across
//! threads using `Arc`; each `diagnose` call builds its own fresh
//! preprocessing artifacts and touches no shared mutable state.

pub mod classifier;
pub mod inference;
pub mod models;
pub mod preprocess;
mod runtime;
pub mod weights;

pub use classifier::{
    ClassifierBuilder, ClassifierError, ClassifierInfo, FeatureExtractor, FusionClassifier,
    FusionHead, Mode, OnnxBackbone,
};
pub use inference::{
    confidences_from_logits, load_image, ConfidenceMap, Diagnosis, DiagnosisReport,
    InferenceService, Verdict, ACCEPTANCE_THRESHOLD,
};
pub use models::{ArtifactInfo, BuiltinModel, FusionSpec, ModelInfo};
pub use preprocess::{
    transform, transform_with_size, PreprocessedSample, DEFAULT_INPUT_SIZE, IMAGENET_MEAN,
    IMAGENET_STD,
};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use weights::{AcquisitionError, Fetch, HttpFetch, WeightStore};

pub fn init_logger() {
    env_logger::init();
}
