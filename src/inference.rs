use std::collections::HashMap;
use std::sync::Arc;

use image::DynamicImage;
use log::info;
use ndarray::{Array1, Axis};

use crate::classifier::{utils::softmax, ClassifierError, FusionClassifier};
use crate::preprocess::{transform_with_size, PreprocessedSample};

/// Mapping from class label to probability. Values are produced by a softmax
/// over the logits and sum to 1 within floating-point tolerance.
pub type ConfidenceMap = HashMap<String, f32>;

/// Minimum top-1 probability required to report a condition. The boundary is
/// inclusive: exactly 0.95 clears it.
pub const ACCEPTANCE_THRESHOLD: f32 = 0.95;

/// Outcome of gating the top class at the acceptance threshold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The top class cleared the threshold
    Condition(String),
    /// No class was confident enough to report
    Uncertain,
}

/// Derived view over a ConfidenceMap: the most probable label, its
/// probability, and whether it cleared the acceptance threshold.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    pub verdict: Verdict,
    pub top_label: String,
    pub confidence: f32,
}

impl Diagnosis {
    /// Derives a diagnosis from a confidence map, or `None` if the map is
    /// empty.
    pub fn from_confidences(confidences: &ConfidenceMap) -> Option<Self> {
        let (label, confidence) = confidences
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        let verdict = if *confidence >= ACCEPTANCE_THRESHOLD {
            Verdict::Condition(label.clone())
        } else {
            Verdict::Uncertain
        };
        Some(Self {
            verdict,
            top_label: label.clone(),
            confidence: *confidence,
        })
    }
}

/// The full result of one diagnose call
pub struct DiagnosisReport {
    pub confidences: ConfidenceMap,
    pub diagnosis: Diagnosis,
    /// Preprocessing artifacts, retained for display
    pub sample: PreprocessedSample,
}

/// Orchestrates one inference pass: augmentation decision, preprocessing,
/// forward pass, softmax, and label mapping.
///
/// Per-call failures leave the underlying classifier untouched; the service
/// remains usable for subsequent calls.
pub struct InferenceService {
    classifier: Arc<FusionClassifier>,
    labels: Arc<Vec<String>>,
    flip_decision: Box<dyn Fn() -> bool + Send + Sync>,
}

impl InferenceService {
    /// Creates a service over a shared classifier, using its label set and a
    /// fair random coin for the flip decision.
    pub fn new(classifier: Arc<FusionClassifier>) -> Self {
        let labels = Arc::new(classifier.labels().to_vec());
        Self {
            classifier,
            labels,
            flip_decision: Box::new(rand::random::<bool>),
        }
    }

    /// Replaces the label set.
    ///
    /// # Errors
    /// `ConfigError` if the label count differs from the classifier's output
    /// dimension; the mapping from ordinal position to name would otherwise
    /// be silently wrong.
    pub fn with_labels(
        mut self,
        labels: Vec<impl Into<String>>,
    ) -> Result<Self, ClassifierError> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.len() != self.classifier.num_classes() {
            return Err(ClassifierError::ConfigError(format!(
                "Label set has {} entries but the classifier produces {} scores",
                labels.len(),
                self.classifier.num_classes()
            )));
        }
        self.labels = Arc::new(labels);
        Ok(self)
    }

    /// Replaces the augmentation coin flip with a deterministic decision
    /// function, making diagnose calls reproducible under test.
    pub fn with_flip_decision(
        mut self,
        decision: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.flip_decision = Box::new(decision);
        self
    }

    /// Runs one full inference pass over the image.
    pub fn diagnose(&self, image: &DynamicImage) -> Result<DiagnosisReport, ClassifierError> {
        let apply_flip = (self.flip_decision)();
        info!("Preprocessing image (flip: {})", apply_flip);
        let sample = transform_with_size(image, apply_flip, self.classifier.input_size());

        let batch = sample.tensor.clone().insert_axis(Axis(0));
        let logits = self.classifier.forward(&batch)?;

        let confidences = confidences_from_logits(&self.labels, &logits)?;
        let diagnosis = Diagnosis::from_confidences(&confidences).ok_or_else(|| {
            ClassifierError::ConfigError("Label set cannot be empty".to_string())
        })?;
        info!(
            "Diagnosis: {:?} (top '{}' at {:.4})",
            diagnosis.verdict, diagnosis.top_label, diagnosis.confidence
        );

        Ok(DiagnosisReport {
            confidences,
            diagnosis,
            sample,
        })
    }
}

/// Opens and decodes an image file for diagnosis.
///
/// Decode failures are per-request `AnalysisError`s, not process-fatal: a
/// corrupt or unreadable file must leave the loaded classifier usable for
/// the next request.
pub fn load_image(path: &std::path::Path) -> Result<DynamicImage, ClassifierError> {
    image::open(path).map_err(|e| {
        ClassifierError::AnalysisError(format!("Failed to decode {}: {}", path.display(), e))
    })
}

/// Softmaxes the logits and zips them ordinally with the label set.
///
/// Ordinal position is the whole contract between names and scores, so a
/// length mismatch is a fatal configuration error rather than something to
/// truncate or pad over.
pub fn confidences_from_logits(
    labels: &[String],
    logits: &Array1<f32>,
) -> Result<ConfidenceMap, ClassifierError> {
    if labels.len() != logits.len() {
        return Err(ClassifierError::ConfigError(format!(
            "Label set has {} entries but the logits vector has {}",
            labels.len(),
            logits.len()
        )));
    }

    let probabilities = softmax(logits);
    Ok(labels
        .iter()
        .cloned()
        .zip(probabilities.iter().cloned())
        .collect())
}
