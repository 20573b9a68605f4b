use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use dermalens::{AcquisitionError, ArtifactInfo, BuiltinModel, Fetch, WeightStore};

/// Serves a fixed payload from memory and counts how many times it is asked
struct CountingFetch {
    payload: Vec<u8>,
    calls: AtomicUsize,
}

impl CountingFetch {
    fn new(payload: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            payload: payload.to_vec(),
            calls: AtomicUsize::new(0),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for CountingFetch {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, AcquisitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.payload.clone())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn artifact_for(payload: &[u8]) -> ArtifactInfo {
    ArtifactInfo::new(
        "test_artifact.bin",
        "https://example.invalid/test_artifact.bin",
        sha256_hex(payload),
    )
}

fn test_store(name: &str, fetcher: Arc<dyn Fetch>) -> WeightStore {
    let dir = std::env::temp_dir()
        .join("dermalens-tests")
        .join(name)
        .join("weights");
    // Start from a clean slate so reruns don't see stale cached files
    let _ = std::fs::remove_dir_all(&dir);
    WeightStore::with_fetcher(dir, fetcher).expect("failed to create weight store")
}

#[tokio::test]
async fn test_resolve_fetches_once_then_reuses_cache() -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"onnx bytes stand-in";
    let fetcher = CountingFetch::new(payload);
    let store = test_store("resolve-once", fetcher.clone());
    let model = BuiltinModel::HybridSkinV1;
    let artifact = artifact_for(payload);

    let path = store.resolve(model, &artifact).await?;
    assert!(path.exists());
    assert_eq!(std::fs::read(&path)?, payload);
    assert_eq!(fetcher.call_count(), 1);

    // Second resolve verifies the cached copy and never touches the transport
    let again = store.resolve(model, &artifact).await?;
    assert_eq!(again, path);
    assert_eq!(fetcher.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_corrupt_cached_file_is_refetched() -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"genuine weight bytes";
    let fetcher = CountingFetch::new(payload);
    let store = test_store("corrupt-refetch", fetcher.clone());
    let model = BuiltinModel::HybridSkinV1;
    let artifact = artifact_for(payload);

    // Plant a corrupt file where the artifact would live
    let path = store.artifact_path(model, &artifact);
    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(&path, b"truncated garbage")?;

    let resolved = store.resolve(model, &artifact).await?;
    assert_eq!(resolved, path);
    assert_eq!(std::fs::read(&path)?, payload);
    assert_eq!(fetcher.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_wrong_payload_is_a_hash_mismatch() {
    let fetcher = CountingFetch::new(b"not the bytes the registry promised");
    let store = test_store("hash-mismatch", fetcher.clone());
    let model = BuiltinModel::HybridSkinV1;
    let artifact = artifact_for(b"the bytes the registry promised");

    let result = store.resolve(model, &artifact).await;
    assert!(matches!(
        result,
        Err(AcquisitionError::HashMismatch { .. })
    ));
    // Nothing is written when the payload fails verification
    assert!(!store.artifact_path(model, &artifact).exists());
}

#[tokio::test]
async fn test_failed_download_leaves_no_partial_model() {
    // The builtin registry hashes never match this payload, so every
    // artifact download fails and the model directory must stay empty.
    let fetcher = CountingFetch::new(b"payload with the wrong hash");
    let store = test_store("partial-cleanup", fetcher.clone());
    let model = BuiltinModel::HybridSkinV1;

    let result = store.download(model).await;
    assert!(result.is_err());
    assert!(!store.is_downloaded(model));
    assert!(!store.backbone_a_path(model).exists());
    assert!(!store.backbone_b_path(model).exists());
    assert!(!store.fusion_head_path(model).exists());
}

#[tokio::test]
async fn test_remove_download_deletes_cached_artifacts(
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = b"cached artifact";
    let fetcher = CountingFetch::new(payload);
    let store = test_store("remove-download", fetcher.clone());
    let model = BuiltinModel::HybridSkinV1;

    // Resolve the builtin file names against the mock payload's real hash so
    // all three land in the cache
    let info = model.info();
    for file_name in [
        info.backbone_a.file_name.as_str(),
        info.backbone_b.file_name.as_str(),
        info.fusion_head.file_name.as_str(),
    ] {
        let artifact = ArtifactInfo::new(
            file_name,
            "https://example.invalid/artifact",
            sha256_hex(payload),
        );
        store.resolve(model, &artifact).await?;
    }
    assert!(store.is_downloaded(model));

    store.remove_download(model)?;
    assert!(!store.is_downloaded(model));
    Ok(())
}
