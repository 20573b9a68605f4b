use ndarray::{Array1, Array2, ArrayView1};
use rand::Rng;
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

use super::error::ClassifierError;

/// Whether dropout is active. Inference always runs in `Eval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Train,
    #[default]
    Eval,
}

/// Parameter names of the serialized head, kept from the sequential layout it
/// was trained with: Linear(0) -> ReLU(1) -> Dropout(2) -> Linear(3).
const PARAM_NAMES: [&str; 4] = ["fc.0.weight", "fc.0.bias", "fc.3.weight", "fc.3.bias"];

const DROPOUT_P: f32 = 0.5;

/// The small trained network that fuses both backbone feature vectors into
/// class logits: Linear -> ReLU -> Dropout -> Linear.
///
/// Dropout participates only in `Mode::Train`; in `Eval` (the default) the
/// forward pass is a pure deterministic function of the input and weights.
pub struct FusionHead {
    w1: Array2<f32>,
    b1: Array1<f32>,
    w2: Array2<f32>,
    b2: Array1<f32>,
    mode: Mode,
}

impl FusionHead {
    /// Builds a head from explicit weight matrices. Layer shapes must agree
    /// with each other; this is the constructor tests and custom loaders use.
    pub fn new(
        w1: Array2<f32>,
        b1: Array1<f32>,
        w2: Array2<f32>,
        b2: Array1<f32>,
    ) -> Result<Self, ClassifierError> {
        if w1.nrows() != b1.len() {
            return Err(ClassifierError::StructuralMismatch(format!(
                "fc.0 weight has {} rows but bias has {} entries",
                w1.nrows(),
                b1.len()
            )));
        }
        if w2.ncols() != w1.nrows() {
            return Err(ClassifierError::StructuralMismatch(format!(
                "fc.3 expects {}-dim input but fc.0 produces {}",
                w2.ncols(),
                w1.nrows()
            )));
        }
        if w2.nrows() != b2.len() {
            return Err(ClassifierError::StructuralMismatch(format!(
                "fc.3 weight has {} rows but bias has {} entries",
                w2.nrows(),
                b2.len()
            )));
        }
        Ok(Self {
            w1,
            b1,
            w2,
            b2,
            mode: Mode::Eval,
        })
    }

    /// Deserializes the head from safetensors bytes.
    ///
    /// The file must contain exactly the four `fc.*` parameters as f32
    /// tensors with shapes matching the given dimensions. Missing or extra
    /// names, wrong shapes, and wrong dtypes all fail loudly; nothing is
    /// truncated or padded.
    pub fn from_safetensors(
        bytes: &[u8],
        fused_dim: usize,
        hidden_dim: usize,
        num_classes: usize,
    ) -> Result<Self, ClassifierError> {
        let tensors = SafeTensors::deserialize(bytes).map_err(|e| {
            ClassifierError::StructuralMismatch(format!("Invalid fusion head file: {}", e))
        })?;

        let mut names: Vec<String> = tensors.names().iter().map(|n| n.to_string()).collect();
        names.sort();
        let mut expected: Vec<String> = PARAM_NAMES.iter().map(|n| n.to_string()).collect();
        expected.sort();
        if names != expected {
            return Err(ClassifierError::StructuralMismatch(format!(
                "Fusion head parameters {:?} do not match expected {:?}",
                names, expected
            )));
        }

        let w1 = matrix(&tensors, "fc.0.weight", hidden_dim, fused_dim)?;
        let b1 = vector(&tensors, "fc.0.bias", hidden_dim)?;
        let w2 = matrix(&tensors, "fc.3.weight", num_classes, hidden_dim)?;
        let b2 = vector(&tensors, "fc.3.bias", num_classes)?;

        Self::new(w1, b1, w2, b2)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Length of the concatenated feature vector the head expects
    pub fn fused_dim(&self) -> usize {
        self.w1.ncols()
    }

    /// Number of raw class scores the head produces
    pub fn num_classes(&self) -> usize {
        self.w2.nrows()
    }

    /// Maps a fused feature vector to raw class scores (logits).
    pub fn forward(&self, fused: &ArrayView1<f32>) -> Result<Array1<f32>, ClassifierError> {
        if fused.len() != self.fused_dim() {
            return Err(ClassifierError::StructuralMismatch(format!(
                "Fused feature vector has {} entries, head expects {}",
                fused.len(),
                self.fused_dim()
            )));
        }

        let mut hidden = self.w1.dot(fused) + &self.b1;
        hidden.mapv_inplace(|v| v.max(0.0));

        if self.mode == Mode::Train {
            let mut rng = rand::rng();
            let keep = 1.0 - DROPOUT_P;
            hidden.mapv_inplace(|v| {
                if rng.random::<f32>() < DROPOUT_P {
                    0.0
                } else {
                    v / keep
                }
            });
        }

        Ok(self.w2.dot(&hidden) + &self.b2)
    }
}

fn raw_tensor<'a>(
    tensors: &'a SafeTensors,
    name: &str,
    expected_shape: &[usize],
) -> Result<Vec<f32>, ClassifierError> {
    let view: TensorView<'a> = tensors.tensor(name).map_err(|e| {
        ClassifierError::StructuralMismatch(format!("Missing fusion head tensor '{}': {}", name, e))
    })?;
    if view.dtype() != Dtype::F32 {
        return Err(ClassifierError::StructuralMismatch(format!(
            "Tensor '{}' has dtype {:?}, expected F32",
            name,
            view.dtype()
        )));
    }
    if view.shape() != expected_shape {
        return Err(ClassifierError::StructuralMismatch(format!(
            "Tensor '{}' has shape {:?}, expected {:?}",
            name,
            view.shape(),
            expected_shape
        )));
    }
    Ok(view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn matrix(
    tensors: &SafeTensors,
    name: &str,
    rows: usize,
    cols: usize,
) -> Result<Array2<f32>, ClassifierError> {
    let data = raw_tensor(tensors, name, &[rows, cols])?;
    Array2::from_shape_vec((rows, cols), data).map_err(|e| {
        ClassifierError::StructuralMismatch(format!("Tensor '{}' has invalid layout: {}", name, e))
    })
}

fn vector(tensors: &SafeTensors, name: &str, len: usize) -> Result<Array1<f32>, ClassifierError> {
    let data = raw_tensor(tensors, name, &[len])?;
    Ok(Array1::from_vec(data))
}
