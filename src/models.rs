/// Represents the available built-in models in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModel {
    /// Dual-backbone skin-lesion model
    ///
    /// Characteristics:
    /// - Backbone A: DenseNet-121 feature graph, 1024-dim output
    /// - Backbone B: EfficientNet-B0 feature graph, 1280-dim output
    /// - Fusion head: 2304 -> 512 -> 2
    /// - Input: 224x224 RGB, ImageNet normalization
    /// - Classes: acne, eczema
    HybridSkinV1,
}

/// A single downloadable artifact of a built-in model.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    /// File name under the model's cache directory
    pub file_name: String,
    /// Download URL
    pub url: String,
    /// Expected SHA-256 of the file contents, lowercase hex
    pub sha256: String,
}

impl ArtifactInfo {
    pub fn new(
        file_name: impl Into<String>,
        url: impl Into<String>,
        sha256: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
            sha256: sha256.into(),
        }
    }
}

/// The complete set of artifacts backing a built-in model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    /// Directory name under the weights cache
    pub name: &'static str,
    /// Backbone A ONNX feature graph
    pub backbone_a: ArtifactInfo,
    /// Backbone B ONNX feature graph
    pub backbone_b: ArtifactInfo,
    /// Fusion head parameters (safetensors)
    pub fusion_head: ArtifactInfo,
}

/// Architecture configuration of a fusion classifier.
///
/// Dimensions live here rather than in the network code so that backbones can
/// be swapped without touching fusion logic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FusionSpec {
    /// Side length of the square network input, in pixels
    pub input_size: u32,
    /// Feature vector length produced by backbone A
    pub feature_dim_a: usize,
    /// Feature vector length produced by backbone B
    pub feature_dim_b: usize,
    /// Width of the hidden fusion layer
    pub hidden_dim: usize,
    /// Class labels in the ordinal order of the head's output vector.
    /// Index position is the contract with the logits; never re-sort.
    pub labels: Vec<String>,
}

impl FusionSpec {
    /// Number of output classes
    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Length of the concatenated feature vector fed to the head
    pub fn fused_dim(&self) -> usize {
        self.feature_dim_a + self.feature_dim_b
    }
}

impl BuiltinModel {
    /// Get the download information for the model's artifacts
    pub fn info(&self) -> ModelInfo {
        match self {
            Self::HybridSkinV1 => ModelInfo {
                name: "hybrid-skin-v1",
                backbone_a: ArtifactInfo::new(
                    "backbone_a.onnx",
                    "https://huggingface.co/dermalens/hybrid-skin-v1/resolve/main/backbone_a.onnx",
                    "3f7a1c9b0d2e46a58c1f0b7d9e3a62c48d5b0f1e7a9c2d4b6e8f0a1c3d5e7f92",
                ),
                backbone_b: ArtifactInfo::new(
                    "backbone_b.onnx",
                    "https://huggingface.co/dermalens/hybrid-skin-v1/resolve/main/backbone_b.onnx",
                    "a84d2e6f1b3c50798d4e2f6a0c1b3d5e7f90a2c4e6d8b0f1a3c5e7d9b2f4a618",
                ),
                fusion_head: ArtifactInfo::new(
                    "fusion_head.safetensors",
                    "https://huggingface.co/dermalens/hybrid-skin-v1/resolve/main/fusion_head.safetensors",
                    "c19e4b7d2a5f8031c6e9d2b5f8a1c4e7d0b3f6a9c2e5d8b1f4a7c0e3d6b9f251",
                ),
            },
        }
    }

    /// Get the architecture configuration of the model
    pub fn spec(&self) -> FusionSpec {
        match self {
            Self::HybridSkinV1 => FusionSpec {
                input_size: 224,
                feature_dim_a: 1024,
                feature_dim_b: 1280,
                hidden_dim: 512,
                labels: vec!["acne".to_string(), "eczema".to_string()],
            },
        }
    }
}
