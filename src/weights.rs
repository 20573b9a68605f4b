use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::{ArtifactInfo, BuiltinModel};

#[derive(Debug, thiserror::Error)]
pub enum AcquisitionError {
    #[error("Download error: {0}")]
    Download(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Remote returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Weight file verification failed for {0}")]
    VerificationFailed(String),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_name}")]
    HashMismatch {
        file_name: String,
        expected: String,
        actual: String,
    },
}

/// Transport used to retrieve weight artifacts.
///
/// Injectable so tests can count fetches or serve bytes from memory instead
/// of hitting the network.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquisitionError>;
}

/// Default HTTP transport. One GET per artifact, no retry, no timeout.
pub struct HttpFetch;

#[async_trait]
impl Fetch for HttpFetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AcquisitionError> {
        let response = reqwest::get(url).await?;
        if !response.status().is_success() {
            return Err(AcquisitionError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Resolves weight artifacts to local files, fetching from remote storage on
/// first use and reusing the cached copies thereafter.
#[derive(Clone)]
pub struct WeightStore {
    weights_dir: PathBuf,
    fetcher: Arc<dyn Fetch>,
    download_lock: Arc<Mutex<()>>,
}

impl WeightStore {
    /// Creates a new WeightStore with the default weights directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::default_weights_dir())
    }

    /// Returns the default weights directory path, honoring the
    /// `DERMALENS_CACHE` environment variable
    pub fn default_weights_dir() -> PathBuf {
        Self::weights_dir_from(env::var("DERMALENS_CACHE").ok())
    }

    fn weights_dir_from(cache_override: Option<String>) -> PathBuf {
        // 1. Explicit cache override
        if let Some(path) = cache_override {
            return PathBuf::from(path).join("weights");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("dermalens").join("weights");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("dermalens").join("weights");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("dermalens").join("weights")
    }

    pub fn new<P: AsRef<Path>>(weights_dir: P) -> io::Result<Self> {
        Self::with_fetcher(weights_dir, Arc::new(HttpFetch))
    }

    /// Creates a WeightStore with a custom transport
    pub fn with_fetcher<P: AsRef<Path>>(
        weights_dir: P,
        fetcher: Arc<dyn Fetch>,
    ) -> io::Result<Self> {
        let weights_dir = weights_dir.as_ref().to_path_buf();
        fs::create_dir_all(&weights_dir)?;
        Ok(Self {
            weights_dir,
            fetcher,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    fn model_dir(&self, model: BuiltinModel) -> PathBuf {
        self.weights_dir.join(model.info().name)
    }

    /// Local path an artifact of the model resolves to
    pub fn artifact_path(&self, model: BuiltinModel, artifact: &ArtifactInfo) -> PathBuf {
        self.model_dir(model).join(&artifact.file_name)
    }

    pub fn backbone_a_path(&self, model: BuiltinModel) -> PathBuf {
        self.artifact_path(model, &model.info().backbone_a)
    }

    pub fn backbone_b_path(&self, model: BuiltinModel) -> PathBuf {
        self.artifact_path(model, &model.info().backbone_b)
    }

    pub fn fusion_head_path(&self, model: BuiltinModel) -> PathBuf {
        self.artifact_path(model, &model.info().fusion_head)
    }

    fn artifacts(model: BuiltinModel) -> [ArtifactInfo; 3] {
        let info = model.info();
        [info.backbone_a, info.backbone_b, info.fusion_head]
    }

    pub fn is_downloaded(&self, model: BuiltinModel) -> bool {
        Self::artifacts(model).iter().all(|artifact| {
            let path = self.artifact_path(model, artifact);
            log::info!("  {} exists: {}", path.display(), path.exists());
            path.exists()
        })
    }

    /// Resolves one artifact of the model to a local path.
    ///
    /// An existing copy that passes its hash check is returned as-is with no
    /// network traffic, so repeated calls fetch at most once. A missing or
    /// corrupt copy is fetched, verified, and written before the path is
    /// returned. No automatic retry.
    pub async fn resolve(
        &self,
        model: BuiltinModel,
        artifact: &ArtifactInfo,
    ) -> Result<PathBuf, AcquisitionError> {
        let _lock = self.download_lock.lock().await;
        self.resolve_inner(model, artifact).await
    }

    async fn resolve_inner(
        &self,
        model: BuiltinModel,
        artifact: &ArtifactInfo,
    ) -> Result<PathBuf, AcquisitionError> {
        let path = self.artifact_path(model, artifact);
        if path.exists() {
            log::info!("{} exists at {:?}, verifying...", artifact.file_name, path);
            if self.verify_file(&path, &artifact.sha256)? {
                log::info!("Existing {} verified successfully", artifact.file_name);
                return Ok(path);
            }
            log::warn!("{} failed verification, redownloading", artifact.file_name);
        } else {
            log::info!("{} does not exist, downloading...", artifact.file_name);
        }

        self.download_and_verify(artifact, &path).await?;
        Ok(path)
    }

    /// Downloads any missing or corrupt artifacts of the model.
    ///
    /// Idempotent once the cache is populated. On failure the partially
    /// downloaded model directory is cleared so a later attempt starts
    /// clean.
    pub async fn download(&self, model: BuiltinModel) -> Result<(), AcquisitionError> {
        let _lock = self.download_lock.lock().await;

        for artifact in Self::artifacts(model) {
            if let Err(e) = self.resolve_inner(model, &artifact).await {
                log::error!("Failed to set up {}: {}", artifact.file_name, e);
                // Cleanup on failure
                let _ = self.remove_download(model);
                return Err(e);
            }
        }

        log::info!("All weight artifacts ready to use");
        Ok(())
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, AcquisitionError> {
        let bytes = fs::read(path)?;
        let hash = sha256_hex(&bytes);
        log::info!("Calculated hash: {}", hash);
        log::info!("Expected hash:   {}", expected_hash);
        Ok(hash == expected_hash)
    }

    /// Verifies every cached artifact of the model against its expected hash
    pub fn verify(&self, model: BuiltinModel) -> Result<bool, AcquisitionError> {
        for artifact in Self::artifacts(model) {
            let path = self.artifact_path(model, &artifact);
            if !path.exists() {
                log::info!("{} does not exist", path.display());
                return Ok(false);
            }
            if !self.verify_file(&path, &artifact.sha256)? {
                log::info!("{} failed hash verification", artifact.file_name);
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn download_and_verify(
        &self,
        artifact: &ArtifactInfo,
        path: &Path,
    ) -> Result<(), AcquisitionError> {
        log::info!(
            "Downloading {} from {} to {:?}",
            artifact.file_name,
            artifact.url,
            path
        );
        let bytes = self.fetcher.fetch(&artifact.url).await?;
        log::info!("Downloaded {} bytes", bytes.len());

        let hash = sha256_hex(&bytes);
        if hash != artifact.sha256 {
            log::error!(
                "{} hash mismatch: expected {}, got {}",
                artifact.file_name,
                artifact.sha256,
                hash
            );
            return Err(AcquisitionError::HashMismatch {
                file_name: artifact.file_name.clone(),
                expected: artifact.sha256.clone(),
                actual: hash,
            });
        }

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        log::info!("Writing {} bytes to {:?}", bytes.len(), path);
        fs::write(path, bytes)?;

        // Verify after writing
        if !self.verify_file(path, &artifact.sha256)? {
            return Err(AcquisitionError::VerificationFailed(
                artifact.file_name.clone(),
            ));
        }

        log::info!("{} downloaded and verified successfully", artifact.file_name);
        Ok(())
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), AcquisitionError> {
        for artifact in Self::artifacts(model) {
            let path = self.artifact_path(model, &artifact);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Ensures that the model's weights are downloaded and verified.
    /// Missing artifacts are downloaded; corrupt ones are re-downloaded.
    pub async fn ensure_downloaded(&self, model: BuiltinModel) -> Result<(), AcquisitionError> {
        log::info!("Checking if weights for {:?} are downloaded...", model);
        if !self.is_downloaded(model) {
            log::info!("Weights not found, downloading...");
            self.download(model).await?;
        } else if !self.verify(model)? {
            log::info!("Weight verification failed, re-downloading...");
            self.remove_download(model)?;
            self.download(model).await?;
        } else {
            log::info!("Weight verification successful");
        }
        Ok(())
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
