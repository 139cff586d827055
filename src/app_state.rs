//! Process initialization: configuration in, wired-up invoker out.

use crate::artifact_store::{ArtifactLayout, ArtifactStore, FsArtifactStore, HttpArtifactStore};
use crate::batch_handler::BatchHandler;
use crate::config::ServiceConfig;
use crate::errors::{PredictError, PredictResult};
use crate::invocation::Invoker;
use crate::kinesis::KinesisClient;
use crate::model_cache::ModelCache;
use crate::publisher::{JsonlFileSink, KinesisSink, PredictionSink};
use std::sync::Arc;
use tracing::info;

pub struct AppState {
    pub config: ServiceConfig,
    pub invoker: Arc<Invoker>,
}

impl AppState {
    pub fn new(config: ServiceConfig, invoker: Arc<Invoker>) -> Self {
        Self { config, invoker }
    }

    pub fn from_config(config: ServiceConfig) -> PredictResult<Self> {
        config.validate()?;

        let store = artifact_store_from_config(&config)?;
        let cache = Arc::new(ModelCache::new(
            store,
            ArtifactLayout::new(config.experiment_id.clone()),
        ));

        let mut handler = BatchHandler::new(sink_from_config(&config)?);
        if let Some(budget) = config.time_budget() {
            handler = handler.with_time_budget(budget);
        }

        let invoker = Arc::new(Invoker::new(
            cache,
            config.model_bucket.clone(),
            config.run_id.clone(),
            handler,
        ));
        Ok(Self::new(config, invoker))
    }
}

/// Local directory first, then the HTTP object endpoint.
pub fn artifact_store_from_config(config: &ServiceConfig) -> PredictResult<Arc<dyn ArtifactStore>> {
    if let Some(root) = &config.artifact_root {
        info!(root = %root.display(), "using filesystem artifact store");
        return Ok(Arc::new(FsArtifactStore::new(root)));
    }
    if let Some(endpoint) = &config.artifact_endpoint_url {
        info!(endpoint = %endpoint, "using HTTP artifact store");
        return Ok(Arc::new(HttpArtifactStore::new(endpoint)?));
    }
    Err(PredictError::config(
        "no artifact source: set RIDE_ARTIFACT_ROOT or MLFLOW_S3_ENDPOINT_URL",
    ))
}

/// No sink for test runs, a JSON-lines file when configured, else the stream.
pub fn sink_from_config(config: &ServiceConfig) -> PredictResult<Option<Arc<dyn PredictionSink>>> {
    if config.test_run {
        info!("test run: predictions are not published");
        return Ok(None);
    }
    if let Some(path) = &config.predictions_file {
        info!(path = %path.display(), "publishing predictions to file");
        return Ok(Some(Arc::new(JsonlFileSink::open(path)?)));
    }

    let endpoint = config.kinesis_endpoint();
    let client = KinesisClient::new(&endpoint)
        .map_err(|e| PredictError::config(format!("kinesis client: {e}")))?;
    info!(stream = %config.predictions_stream_name, endpoint = %endpoint, "publishing predictions to stream");
    Ok(Some(Arc::new(KinesisSink::new(
        client,
        config.predictions_stream_name.clone(),
    ))))
}
