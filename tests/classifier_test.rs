use std::sync::Arc;
use std::thread;

use ndarray::array;
use safetensors::tensor::TensorView;
use safetensors::Dtype;

use dermalens::{
    BuiltinModel, ClassifierError, FusionClassifier, FusionHead, InferenceService, WeightStore,
};

fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Serializes a 4 -> 3 -> 2 head into safetensors bytes
fn tiny_head_bytes() -> Vec<u8> {
    let w1 = f32_bytes(&[
        0.1, 0.0, 0.0, 0.0, //
        0.0, 0.1, 0.0, 0.0, //
        0.0, 0.0, 0.1, 0.0,
    ]);
    let b1 = f32_bytes(&[0.0, 0.0, 0.0]);
    let w2 = f32_bytes(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    let b2 = f32_bytes(&[0.5, -0.5]);

    let tensors = vec![
        ("fc.0.weight", TensorView::new(Dtype::F32, vec![3, 4], &w1).unwrap()),
        ("fc.0.bias", TensorView::new(Dtype::F32, vec![3], &b1).unwrap()),
        ("fc.3.weight", TensorView::new(Dtype::F32, vec![2, 3], &w2).unwrap()),
        ("fc.3.bias", TensorView::new(Dtype::F32, vec![2], &b2).unwrap()),
    ];
    safetensors::serialize(tensors, &None).expect("failed to serialize head")
}

#[test]
fn test_head_loads_from_serialized_parameters() {
    let head = FusionHead::from_safetensors(&tiny_head_bytes(), 4, 3, 2)
        .expect("head should load from well-formed bytes");
    assert_eq!(head.fused_dim(), 4);
    assert_eq!(head.num_classes(), 2);

    let fused = array![10.0_f32, 20.0, 30.0, 40.0];
    let logits = head.forward(&fused.view()).unwrap();
    // Hidden is [1, 2, 3] after the 0.1-scaled identity and ReLU
    assert!((logits[0] - 1.5).abs() < 1e-5);
    assert!((logits[1] - 1.5).abs() < 1e-5);
}

#[test]
fn test_head_rejects_mismatched_dimensions() {
    // The serialized head is 4 -> 3 -> 2; asking for a 2304-wide head must
    // fail loudly instead of loading a partially-matching parameter set
    let result = FusionHead::from_safetensors(&tiny_head_bytes(), 2304, 512, 2);
    assert!(matches!(
        result,
        Err(ClassifierError::StructuralMismatch(_))
    ));
}

/// End-to-end tests require the real weight files. They are skipped when the
/// cache is empty so the suite passes offline. The store is constructed
/// explicitly and handed to the builder rather than recreated inside it.
fn downloaded_model() -> Option<(WeightStore, BuiltinModel)> {
    let model = BuiltinModel::HybridSkinV1;
    let store = WeightStore::new(WeightStore::default_weights_dir()).ok()?;
    if store.is_downloaded(model) {
        Some((store, model))
    } else {
        eprintln!("skipping: weights for {:?} not downloaded", model);
        None
    }
}

#[test]
fn test_end_to_end_diagnosis() -> Result<(), Box<dyn std::error::Error>> {
    let Some((store, model)) = downloaded_model() else {
        return Ok(());
    };

    let classifier = Arc::new(
        FusionClassifier::builder()
            .with_model_from(&store, model)?
            .build()?,
    );
    let service = InferenceService::new(Arc::clone(&classifier)).with_flip_decision(|| false);

    let image = image::DynamicImage::new_rgb8(320, 240);
    let report = service.diagnose(&image)?;

    assert_eq!(report.confidences.len(), classifier.num_classes());
    let total: f32 = report.confidences.values().sum();
    assert!((total - 1.0).abs() < 1e-4);
    assert!(report.confidences.contains_key(&report.diagnosis.top_label));
    Ok(())
}

#[test]
fn test_classifier_is_shareable_across_threads() -> Result<(), Box<dyn std::error::Error>> {
    let Some((store, model)) = downloaded_model() else {
        return Ok(());
    };

    let classifier = Arc::new(
        FusionClassifier::builder()
            .with_model_from(&store, model)?
            .build()?,
    );

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let classifier = Arc::clone(&classifier);
            thread::spawn(move || {
                let service =
                    InferenceService::new(classifier).with_flip_decision(|| false);
                let image = image::DynamicImage::new_rgb8(64, 64);
                service.diagnose(&image).map(|r| r.diagnosis.top_label)
            })
        })
        .collect();

    let mut labels = Vec::new();
    for handle in handles {
        labels.push(handle.join().expect("thread panicked")?);
    }
    // Identical input and no flip, so every thread must agree
    assert!(labels.windows(2).all(|w| w[0] == w[1]));
    Ok(())
}

#[test]
fn test_label_count_mismatch_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let Some((store, model)) = downloaded_model() else {
        return Ok(());
    };

    let classifier = Arc::new(
        FusionClassifier::builder()
            .with_model_from(&store, model)?
            .build()?,
    );
    let result = InferenceService::new(classifier).with_labels(vec!["only-one"]);
    assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
    Ok(())
}
