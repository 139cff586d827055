//! Model artifact storage.
//!
//! Artifacts live in a named bucket under a fixed per-run layout. Backends only
//! know how to fetch bytes for a `(bucket, key)` pair; a missing object is
//! `Ok(None)` so the caller can report which artifact is absent.

use crate::errors::{PredictError, PredictResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Storage backend for model artifacts
pub trait ArtifactStore: Send + Sync {
    /// Fetch an object, `Ok(None)` if it does not exist.
    fn fetch(&self, bucket: &str, key: &str) -> PredictResult<Option<Vec<u8>>>;

    /// Human readable location of an object, for errors and logs.
    fn locate(&self, bucket: &str, key: &str) -> String;
}

/// Per-run artifact layout: `<experiment_id>/<run_id>/artifacts/...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub experiment_id: String,
}

pub const MODEL_FILE: &str = "model/model.json";
pub const ENCODER_FILE: &str = "dict_vectorizer.json";
pub const MANIFEST_FILE: &str = "manifest.json";

impl ArtifactLayout {
    pub fn new(experiment_id: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
        }
    }

    /// Key prefix shared by every artifact of a run
    pub fn run_prefix(&self, run_id: &str) -> String {
        format!("{}/{}/artifacts", self.experiment_id, run_id)
    }

    pub fn key(&self, run_id: &str, file: &str) -> String {
        format!("{}/{}", self.run_prefix(run_id), file)
    }

    pub fn model_key(&self, run_id: &str) -> String {
        self.key(run_id, MODEL_FILE)
    }

    pub fn encoder_key(&self, run_id: &str) -> String {
        self.key(run_id, ENCODER_FILE)
    }

    pub fn manifest_key(&self, run_id: &str) -> String {
        self.key(run_id, MANIFEST_FILE)
    }
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        Self::new("1")
    }
}

/// Optional digest list written next to the artifacts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactManifest {
    /// Relative artifact path -> lowercase hex SHA-256
    pub files: BTreeMap<String, String>,
}

impl ArtifactManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| format!("invalid manifest JSON: {e}"))
    }

    /// Check `bytes` against the recorded digest, if one is recorded.
    pub fn verify(&self, file: &str, bytes: &[u8]) -> Result<(), String> {
        match self.files.get(file) {
            Some(expected) => {
                let actual = sha256_hex(bytes);
                if expected.eq_ignore_ascii_case(&actual) {
                    Ok(())
                } else {
                    Err(format!(
                        "digest mismatch for {file}: expected {expected}, got {actual}"
                    ))
                }
            }
            None => Ok(()),
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn check_segment(what: &str, value: &str) -> PredictResult<()> {
    let path = Path::new(value);
    let safe = !value.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(PredictError::artifact_not_found(
            value,
            format!("{what} is not a plain relative path"),
        ))
    }
}

/// Buckets as directories under a local root
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, bucket: &str, key: &str) -> PredictResult<PathBuf> {
        check_segment("bucket", bucket)?;
        check_segment("key", key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn fetch(&self, bucket: &str, key: &str) -> PredictResult<Option<Vec<u8>>> {
        let path = self.path_for(bucket, key)?;
        debug!(path = %path.display(), "reading artifact");
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PredictError::artifact_not_found(
                path.display().to_string(),
                e.to_string(),
            )),
        }
    }

    fn locate(&self, bucket: &str, key: &str) -> String {
        self.root.join(bucket).join(key).display().to_string()
    }
}

/// Path-style object store over HTTP, e.g. a local S3-compatible endpoint
pub struct HttpArtifactStore {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpArtifactStore {
    pub fn new(endpoint: &str) -> PredictResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PredictError::config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl ArtifactStore for HttpArtifactStore {
    fn fetch(&self, bucket: &str, key: &str) -> PredictResult<Option<Vec<u8>>> {
        let url = self.locate(bucket, key);
        debug!(url = %url, "fetching artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| PredictError::artifact_not_found(&url, e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(PredictError::artifact_not_found(
                &url,
                format!("storage returned HTTP {status}"),
            ));
        }

        let bytes = response
            .bytes()
            .map_err(|e| PredictError::artifact_not_found(&url, e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    fn locate(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }
}
