mod backbone;
pub mod builder;
mod classifier;
mod error;
mod fusion;
pub(crate) mod utils;

pub use backbone::{FeatureExtractor, OnnxBackbone};
pub use builder::ClassifierBuilder;
pub use classifier::{ClassifierInfo, FusionClassifier};
pub use error::ClassifierError;
pub use fusion::{FusionHead, Mode};
