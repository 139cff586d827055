// Service configuration for the ride duration predictor
// Values are layered by config_loader; this module owns the shape and validation.

use crate::errors::{PredictError, PredictResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub model_bucket: String,
    #[serde(deserialize_with = "lenient_string")]
    pub run_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub experiment_id: String,
    pub predictions_stream_name: String,
    pub input_stream_name: String,
    /// Skip publishing entirely
    #[serde(deserialize_with = "lenient_flag")]
    pub test_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinesis_endpoint_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_endpoint_url: Option<String>,
    pub region: String,

    /// Local directory holding `<bucket>/<key>` artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_root: Option<PathBuf>,
    /// Publish to a JSON-lines file instead of the stream
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predictions_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_time_budget_ms: Option<u64>,

    pub shard_id: String,
    pub poll_limit: u32,
    pub idle_backoff_ms: u64,

    pub log_filter: String,
    #[serde(deserialize_with = "lenient_flag")]
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_bucket: "mlflow-models-rll".to_string(),
            run_id: String::new(),
            experiment_id: "1".to_string(),
            predictions_stream_name: "ride_predictions".to_string(),
            input_stream_name: "ride-events".to_string(),
            test_run: false,
            kinesis_endpoint_url: None,
            artifact_endpoint_url: None,
            region: "us-east-1".to_string(),
            artifact_root: None,
            predictions_file: None,
            batch_time_budget_ms: None,
            shard_id: "shardId-000000000000".to_string(),
            poll_limit: 10,
            idle_backoff_ms: 1000,
            log_filter: "info".to_string(),
            log_json: false,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> PredictResult<()> {
        if self.model_bucket.trim().is_empty() {
            return Err(PredictError::config("model_bucket must be set"));
        }
        if self.run_id.trim().is_empty() {
            return Err(PredictError::config("run_id must be set (RUN_ID)"));
        }
        if self.experiment_id.trim().is_empty() {
            return Err(PredictError::config("experiment_id must not be empty"));
        }
        if self.publishes_to_stream() && self.predictions_stream_name.trim().is_empty() {
            return Err(PredictError::config(
                "predictions_stream_name is required unless test_run or predictions_file is set",
            ));
        }
        for (name, url) in [
            ("kinesis_endpoint_url", &self.kinesis_endpoint_url),
            ("artifact_endpoint_url", &self.artifact_endpoint_url),
        ] {
            if let Some(url) = url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(PredictError::config(format!(
                        "{name} must be an http(s) URL, got '{url}'"
                    )));
                }
            }
        }
        if self.poll_limit == 0 {
            return Err(PredictError::config("poll_limit must be at least 1"));
        }
        Ok(())
    }

    /// Predictions go to the output stream (not skipped, not to a file).
    pub fn publishes_to_stream(&self) -> bool {
        !self.test_run && self.predictions_file.is_none()
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.batch_time_budget_ms.map(Duration::from_millis)
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    /// Explicit endpoint, else the regional service endpoint.
    pub fn kinesis_endpoint(&self) -> String {
        self.kinesis_endpoint_url
            .clone()
            .unwrap_or_else(|| format!("https://kinesis.{}.amazonaws.com", self.region))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FlagRepr {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Accepts `true/false`, `1/0` and their string forms in any case.
fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match FlagRepr::deserialize(deserializer)? {
        FlagRepr::Bool(b) => Ok(b),
        FlagRepr::Int(i) => Ok(i != 0),
        FlagRepr::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got '{other}'"
            ))),
        },
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Text(String),
    Int(i64),
    UInt(u64),
}

/// Ids may arrive as numbers once an env value looks numeric.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match IdRepr::deserialize(deserializer)? {
        IdRepr::Text(s) => s,
        IdRepr::Int(i) => i.to_string(),
        IdRepr::UInt(u) => u.to_string(),
    })
}
