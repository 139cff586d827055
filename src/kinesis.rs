//! Minimal Kinesis JSON protocol client.
//!
//! Speaks `application/x-amz-json-1.1` to a Kinesis-compatible endpoint.
//! Requests are not SigV4 signed, so this targets local emulators and
//! endpoints behind a signing proxy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const TARGET_PREFIX: &str = "Kinesis_20131202";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Error, Debug)]
pub enum KinesisError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{action} rejected with HTTP {status}: {error_type} {message}")]
    Service {
        action: String,
        status: u16,
        error_type: String,
        message: String,
    },

    #[error("Unexpected {action} response: {message}")]
    Response { action: String, message: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PutRecordRequest<'a> {
    stream_name: &'a str,
    /// base64 of the record bytes
    data: String,
    partition_key: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PutRecordOutput {
    pub shard_id: String,
    pub sequence_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetShardIteratorRequest<'a> {
    stream_name: &'a str,
    shard_id: &'a str,
    shard_iterator_type: ShardIteratorType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetShardIteratorOutput {
    shard_iterator: String,
}

/// Where a new shard iterator starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShardIteratorType {
    Latest,
    TrimHorizon,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetRecordsRequest<'a> {
    shard_iterator: &'a str,
    limit: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ShardRecord {
    /// base64 of the record bytes
    pub data: String,
    #[serde(default)]
    pub partition_key: Option<String>,
    pub sequence_number: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetRecordsOutput {
    #[serde(default)]
    pub records: Vec<ShardRecord>,
    /// Absent once the shard is closed and fully read
    #[serde(default)]
    pub next_shard_iterator: Option<String>,
    #[serde(default)]
    pub millis_behind_latest: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(rename = "__type", default)]
    error_type: String,
    #[serde(alias = "Message", default)]
    message: String,
}

pub struct KinesisClient {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl KinesisClient {
    pub fn new(endpoint: &str) -> Result<Self, KinesisError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        action: &str,
        body: &Req,
    ) -> Result<Resp, KinesisError> {
        debug!(action, endpoint = %self.endpoint, "kinesis request");

        let response = self
            .client
            .post(format!("{}/", self.endpoint))
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .json(body)
            .send()?;

        let status = response.status();
        let bytes = response.bytes()?;

        if !status.is_success() {
            let err: ServiceError = serde_json::from_slice(&bytes).unwrap_or(ServiceError {
                error_type: "UnknownError".to_string(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            });
            return Err(KinesisError::Service {
                action: action.to_string(),
                status: status.as_u16(),
                error_type: err.error_type,
                message: err.message,
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| KinesisError::Response {
            action: action.to_string(),
            message: e.to_string(),
        })
    }

    pub fn put_record(
        &self,
        stream_name: &str,
        data: &[u8],
        partition_key: &str,
    ) -> Result<PutRecordOutput, KinesisError> {
        use base64::Engine as _;
        let request = PutRecordRequest {
            stream_name,
            data: base64::engine::general_purpose::STANDARD.encode(data),
            partition_key,
        };
        self.call("PutRecord", &request)
    }

    pub fn get_shard_iterator(
        &self,
        stream_name: &str,
        shard_id: &str,
        iterator_type: ShardIteratorType,
    ) -> Result<String, KinesisError> {
        let request = GetShardIteratorRequest {
            stream_name,
            shard_id,
            shard_iterator_type: iterator_type,
        };
        let output: GetShardIteratorOutput = self.call("GetShardIterator", &request)?;
        Ok(output.shard_iterator)
    }

    pub fn get_records(
        &self,
        shard_iterator: &str,
        limit: u32,
    ) -> Result<GetRecordsOutput, KinesisError> {
        self.call(
            "GetRecords",
            &GetRecordsRequest {
                shard_iterator,
                limit,
            },
        )
    }
}
