use image::{DynamicImage, Rgb, RgbImage};

use dermalens::{transform, transform_with_size, DEFAULT_INPUT_SIZE, IMAGENET_MEAN, IMAGENET_STD};

/// A horizontal gradient so every column is distinguishable after resizing
fn gradient_image(width: u32, height: u32) -> DynamicImage {
    let mut img = RgbImage::new(width, height);
    for (x, _y, pixel) in img.enumerate_pixels_mut() {
        let v = (x * 255 / width.max(1)) as u8;
        *pixel = Rgb([v, 255 - v, 128]);
    }
    DynamicImage::ImageRgb8(img)
}

#[test]
fn test_tensor_shape_and_default_size() {
    let sample = transform(&gradient_image(640, 480), false);
    let size = DEFAULT_INPUT_SIZE as usize;
    assert_eq!(sample.tensor.shape(), &[3, size, size]);
    assert_eq!(sample.resized.dimensions(), (DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE));
}

#[test]
fn test_transform_is_deterministic() {
    let image = gradient_image(300, 200);
    let a = transform(&image, false);
    let b = transform(&image, false);
    assert_eq!(a.tensor, b.tensor);
}

#[test]
fn test_flip_mirrors_tensor_columns() {
    let image = gradient_image(448, 448);
    let plain = transform(&image, false);
    let flipped = transform(&image, true);

    let size = DEFAULT_INPUT_SIZE as usize;
    for c in 0..3 {
        for x in 0..size {
            let straight = plain.tensor[[c, 100, x]];
            let mirrored = flipped.tensor[[c, 100, size - 1 - x]];
            assert!(
                (straight - mirrored).abs() < 1e-6,
                "channel {} column {} differs after mirroring",
                c,
                x
            );
        }
    }
}

#[test]
fn test_normalized_values_stay_in_imagenet_range() {
    let sample = transform(&gradient_image(100, 100), false);
    // Pixel values in [0, 1] normalized by the ImageNet statistics land in
    // (-mean/std, (1-mean)/std) per channel
    for c in 0..3 {
        let lo = -IMAGENET_MEAN[c] / IMAGENET_STD[c];
        let hi = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        for &v in sample.tensor.index_axis(ndarray::Axis(0), c).iter() {
            assert!(v >= lo - 1e-5 && v <= hi + 1e-5);
        }
    }
}

#[test]
fn test_custom_input_size() {
    let sample = transform_with_size(&gradient_image(512, 512), false, 96);
    assert_eq!(sample.tensor.shape(), &[3, 96, 96]);
    assert_eq!(sample.resized.dimensions(), (96, 96));
}
