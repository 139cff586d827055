//! Host invocation adapter: stream event in, invocation response out.

use crate::batch_handler::{BatchHandler, BatchResult};
use crate::envelope::PredictionEnvelope;
use crate::errors::PredictResult;
use crate::model_cache::{ModelBundle, ModelCache};
use crate::transport::StreamEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemFailure {
    #[serde(rename = "itemIdentifier")]
    pub item_identifier: String,
}

/// Response handed back to the serverless runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    pub predictions: Vec<PredictionEnvelope>,
    #[serde(rename = "batchItemFailures", default)]
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl From<&BatchResult> for InvocationResponse {
    fn from(result: &BatchResult) -> Self {
        Self {
            predictions: result.envelopes().into_iter().cloned().collect(),
            batch_item_failures: result
                .failures()
                .map(|o| BatchItemFailure {
                    item_identifier: o.item_identifier(),
                })
                .collect(),
        }
    }
}

/// Owns the cache and the configured run; one per process.
pub struct Invoker {
    cache: Arc<ModelCache>,
    bucket: String,
    run_id: String,
    handler: BatchHandler,
}

impl Invoker {
    pub fn new(
        cache: Arc<ModelCache>,
        bucket: impl Into<String>,
        run_id: impl Into<String>,
        handler: BatchHandler,
    ) -> Self {
        Self {
            cache,
            bucket: bucket.into(),
            run_id: run_id.into(),
            handler,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn handler(&self) -> &BatchHandler {
        &self.handler
    }

    /// Load the configured bundle (cold start) or return the cached one.
    pub fn warm(&self) -> PredictResult<Arc<ModelBundle>> {
        self.cache.load_model(&self.bucket, &self.run_id)
    }

    /// Whether the configured bundle is already cached.
    pub fn is_ready(&self) -> PredictResult<bool> {
        Ok(self.cache.get(&self.bucket, &self.run_id)?.is_some())
    }

    /// Run one batch; fails only when the bundle cannot be loaded.
    pub fn process(&self, event: &StreamEvent) -> PredictResult<BatchResult> {
        let bundle = self.warm().map_err(|e| {
            error!(bucket = %self.bucket, run_id = %self.run_id, error = %e, "invocation aborted");
            e
        })?;
        Ok(self.handler.handle(&event.records, &bundle))
    }

    pub fn invoke(&self, event: &StreamEvent) -> PredictResult<InvocationResponse> {
        let result = self.process(event)?;
        let response = InvocationResponse::from(&result);
        info!(
            invocation_id = %result.invocation_id,
            predictions = response.predictions.len(),
            item_failures = response.batch_item_failures.len(),
            "invocation complete"
        );
        Ok(response)
    }
}
