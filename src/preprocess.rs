use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use ndarray::Array3;

/// Per-channel normalization constants of the corpus the backbones were
/// pretrained on (ImageNet), R/G/B order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Input side length the published model was trained with
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Everything one preprocessing pass produced. The intermediate images are
/// retained purely for downstream visualization; only `tensor` feeds the
/// classifier. Built fresh for every inference call, never mutated.
pub struct PreprocessedSample {
    /// The caller's image, untouched
    pub original: DynamicImage,
    /// After the direct resize, before any mirroring
    pub resized: RgbImage,
    /// After the optional horizontal mirror (equal to `resized` when the
    /// flip was not applied)
    pub flipped: RgbImage,
    /// Normalized CHW tensor, channel order R,G,B
    pub tensor: Array3<f32>,
}

/// Preprocesses an image for the fusion classifier at the default 224x224
/// input size. See [`transform_with_size`].
pub fn transform(image: &DynamicImage, apply_flip: bool) -> PreprocessedSample {
    transform_with_size(image, apply_flip, DEFAULT_INPUT_SIZE)
}

/// Preprocesses an image in three fixed steps:
///
/// 1. Direct resize to `size`x`size` (aspect ratio is not preserved; there
///    is no cropping).
/// 2. A deterministic horizontal mirror iff `apply_flip` is set. Whether to
///    flip is the caller's decision; this function is a pure function of its
///    inputs.
/// 3. Conversion to a CHW float tensor scaled to [0, 1], then per-channel
///    ImageNet normalization `(value - mean_c) / std_c`.
///
/// Non-RGB inputs are explicitly coerced to RGB before the tensor
/// conversion: grayscale luma is replicated into all three channels, alpha
/// is discarded, and palette images are expanded. A mismatched channel
/// count can therefore never reach the normalization step.
pub fn transform_with_size(
    image: &DynamicImage,
    apply_flip: bool,
    size: u32,
) -> PreprocessedSample {
    let resized_img = image.resize_exact(size, size, FilterType::Triangle);
    let flipped_img = if apply_flip {
        resized_img.fliph()
    } else {
        resized_img.clone()
    };

    let resized = resized_img.to_rgb8();
    let flipped = flipped_img.to_rgb8();
    let tensor = normalize(&flipped);

    PreprocessedSample {
        original: image.clone(),
        resized,
        flipped,
        tensor,
    }
}

fn normalize(rgb: &RgbImage) -> Array3<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array3::zeros((3, height as usize, width as usize));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let scaled = pixel[c] as f32 / 255.0;
            tensor[[c, y as usize, x as usize]] = (scaled - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }
    tensor
}
