use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur in the fusion classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// Weight files could not be acquired or read
    AcquisitionError(String),
    /// Stored weights disagree with the instantiated architecture's
    /// parameter names or shapes
    StructuralMismatch(String),
    /// Error occurred during the build phase
    BuildError(String),
    /// Label set or dimension configuration is inconsistent
    ConfigError(String),
    /// Error occurred during a single diagnose call
    AnalysisError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcquisitionError(msg) => write!(f, "Acquisition error: {}", msg),
            Self::StructuralMismatch(msg) => write!(f, "Structural mismatch: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Self::AnalysisError(msg) => write!(f, "Analysis error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::BuildError(err.to_string())
    }
}

impl From<crate::weights::AcquisitionError> for ClassifierError {
    fn from(err: crate::weights::AcquisitionError) -> Self {
        ClassifierError::AcquisitionError(err.to_string())
    }
}
