//! Model bundle loading and the process-wide bundle cache.
//!
//! The cache is an ordinary value built by the process's initialization path
//! and handed to whoever needs a bundle. Bundles are immutable once loaded and
//! shared as `Arc<ModelBundle>`.

use crate::artifact_store::{
    sha256_hex, ArtifactLayout, ArtifactManifest, ArtifactStore, ENCODER_FILE, MODEL_FILE,
};
use crate::encoder::DictVectorizer;
use crate::errors::{PredictError, PredictResult, SafeLock};
use crate::regression::RegressionModel;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Loaded (encoder, model) pair for one run
#[derive(Debug)]
pub struct ModelBundle {
    pub bucket: String,
    pub run_id: String,
    pub encoder: DictVectorizer,
    pub model: RegressionModel,
    pub model_sha256: String,
    pub location: String,
    pub loaded_at: DateTime<Utc>,
}

impl ModelBundle {
    /// Assemble a bundle, checking that encoder and model agree on width.
    pub fn new(
        bucket: impl Into<String>,
        run_id: impl Into<String>,
        encoder: DictVectorizer,
        model: RegressionModel,
    ) -> PredictResult<Self> {
        let bucket = bucket.into();
        let run_id = run_id.into();
        if encoder.n_features() != model.n_features() {
            return Err(PredictError::artifact_corrupt(
                format!("{bucket}/{run_id}"),
                format!(
                    "encoder produces {} columns but model expects {}",
                    encoder.n_features(),
                    model.n_features()
                ),
            ));
        }
        Ok(Self {
            location: format!("{bucket}/{run_id}"),
            bucket,
            run_id,
            encoder,
            model,
            model_sha256: String::new(),
            loaded_at: Utc::now(),
        })
    }
}

/// Read and deserialize the bundle for `(bucket, run_id)` from storage.
pub fn load_bundle(
    store: &dyn ArtifactStore,
    layout: &ArtifactLayout,
    bucket: &str,
    run_id: &str,
) -> PredictResult<ModelBundle> {
    if bucket.trim().is_empty() || run_id.trim().is_empty() {
        return Err(PredictError::artifact_not_found(
            format!("{bucket}/{run_id}"),
            "bucket and run id must be non-empty",
        ));
    }

    let encoder_key = layout.encoder_key(run_id);
    let model_key = layout.model_key(run_id);
    let encoder_loc = store.locate(bucket, &encoder_key);
    let model_loc = store.locate(bucket, &model_key);

    let encoder_bytes = store
        .fetch(bucket, &encoder_key)?
        .ok_or_else(|| PredictError::artifact_not_found(&encoder_loc, "encoder artifact is absent"))?;
    let model_bytes = store
        .fetch(bucket, &model_key)?
        .ok_or_else(|| PredictError::artifact_not_found(&model_loc, "model artifact is absent"))?;

    let manifest_key = layout.manifest_key(run_id);
    if let Some(raw) = store.fetch(bucket, &manifest_key)? {
        let manifest_loc = store.locate(bucket, &manifest_key);
        let manifest = ArtifactManifest::from_slice(&raw)
            .map_err(|e| PredictError::artifact_corrupt(&manifest_loc, e))?;
        manifest
            .verify(ENCODER_FILE, &encoder_bytes)
            .map_err(|e| PredictError::artifact_corrupt(&encoder_loc, e))?;
        manifest
            .verify(MODEL_FILE, &model_bytes)
            .map_err(|e| PredictError::artifact_corrupt(&model_loc, e))?;
    }

    let encoder = DictVectorizer::from_slice(&encoder_bytes)
        .map_err(|e| PredictError::artifact_corrupt(&encoder_loc, e))?;
    let model = RegressionModel::from_slice(&model_bytes)
        .map_err(|e| PredictError::artifact_corrupt(&model_loc, e))?;

    let mut bundle = ModelBundle::new(bucket, run_id, encoder, model)?;
    bundle.model_sha256 = sha256_hex(&model_bytes);
    bundle.location = store.locate(bucket, &layout.run_prefix(run_id));
    Ok(bundle)
}

type BundleKey = (String, String);

/// Lazily populated bundle cache keyed by `(bucket, run_id)`
pub struct ModelCache {
    store: Arc<dyn ArtifactStore>,
    layout: ArtifactLayout,
    bundles: Mutex<HashMap<BundleKey, Arc<ModelBundle>>>,
}

impl ModelCache {
    pub fn new(store: Arc<dyn ArtifactStore>, layout: ArtifactLayout) -> Self {
        Self {
            store,
            layout,
            bundles: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached bundle or load it. The lock is held across the load
    /// so concurrent first calls still read storage once.
    pub fn load_model(&self, bucket: &str, run_id: &str) -> PredictResult<Arc<ModelBundle>> {
        let mut bundles = self.bundles.safe_lock()?;
        let key = (bucket.to_string(), run_id.to_string());

        if let Some(bundle) = bundles.get(&key) {
            return Ok(Arc::clone(bundle));
        }

        let bundle = match load_bundle(self.store.as_ref(), &self.layout, bucket, run_id) {
            Ok(b) => Arc::new(b),
            Err(e) => {
                warn!(bucket = %bucket, run_id = %run_id, error = %e, "model bundle load failed");
                return Err(e);
            }
        };

        info!(
            bucket = %bucket,
            run_id = %run_id,
            model = bundle.model.kind_name(),
            features = bundle.encoder.n_features(),
            location = %bundle.location,
            "model bundle loaded"
        );

        bundles.insert(key, Arc::clone(&bundle));
        Ok(bundle)
    }

    /// Cached bundle without loading, if present.
    pub fn get(&self, bucket: &str, run_id: &str) -> PredictResult<Option<Arc<ModelBundle>>> {
        let bundles = self.bundles.safe_lock()?;
        Ok(bundles
            .get(&(bucket.to_string(), run_id.to_string()))
            .cloned())
    }

    pub fn len(&self) -> PredictResult<usize> {
        Ok(self.bundles.safe_lock()?.len())
    }

    pub fn is_empty(&self) -> PredictResult<bool> {
        Ok(self.len()? == 0)
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }
}
