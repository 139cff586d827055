//! Stream event envelope and record decoding.
//!
//! Records are kept as raw JSON until the handler reaches them, so a record
//! with the wrong shape fails on its own instead of rejecting the event.

use crate::errors::{PredictError, PredictResult};
use crate::trip_record::TripRecord;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Batch of stream records as delivered to the function.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<RawRecord>,
}

impl StreamEvent {
    pub fn from_slice(bytes: &[u8]) -> PredictResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| PredictError::decode(format!("stream event is not valid: {e}")))
    }

    /// Build an event from ride payloads, encoding each the way the stream does.
    pub fn from_payloads<'a>(payloads: impl IntoIterator<Item = &'a Value>) -> Self {
        Self {
            records: payloads
                .into_iter()
                .enumerate()
                .map(|(i, p)| RawRecord::from_payload(p, &format!("{i}")))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One transport record: `{"eventID"?, "kinesis": {"data", "sequenceNumber"?, ...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub Value);

impl RawRecord {
    /// Wrap a JSON payload as a base64 stream record.
    pub fn from_payload(payload: &Value, sequence_number: &str) -> Self {
        Self::from_data(payload.to_string().as_bytes(), sequence_number, None)
    }

    pub fn from_data(data: &[u8], sequence_number: &str, partition_key: Option<&str>) -> Self {
        Self::from_encoded(&STANDARD.encode(data), sequence_number, partition_key)
    }

    /// Wrap data that is already base64, as returned by `GetRecords`.
    pub fn from_encoded(data: &str, sequence_number: &str, partition_key: Option<&str>) -> Self {
        let mut kinesis = json!({
            "data": data,
            "sequenceNumber": sequence_number,
        });
        if let Some(key) = partition_key {
            kinesis["partitionKey"] = Value::String(key.to_string());
        }
        RawRecord(json!({ "kinesis": kinesis }))
    }

    pub fn data(&self) -> Option<&str> {
        self.0.get("kinesis")?.get("data")?.as_str()
    }

    pub fn sequence_number(&self) -> Option<&str> {
        self.0.get("kinesis")?.get("sequenceNumber")?.as_str()
    }

    pub fn event_id(&self) -> Option<&str> {
        self.0.get("eventID")?.as_str()
    }
}

/// base64 -> JSON -> validated trip.
pub fn decode_record(record: &RawRecord) -> PredictResult<TripRecord> {
    let data = record
        .data()
        .ok_or_else(|| PredictError::decode("record has no kinesis.data string"))?;

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|e| PredictError::decode(format!("invalid base64: {e}")))?;

    TripRecord::from_json_slice(&bytes)
}
