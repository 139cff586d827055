//! Stream batch handler.
//!
//! Every input record maps to exactly one outcome, in input order. Nothing
//! that happens to a single record escapes this module as an error; the only
//! batch-level failure is the bundle load, which happens before we get here.

use crate::envelope::PredictionEnvelope;
use crate::errors::{ErrorKind, PredictError};
use crate::model_cache::ModelBundle;
use crate::prediction_service::predict_trip;
use crate::publisher::PredictionSink;
use crate::transport::{decode_record, RawRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        envelope: PredictionEnvelope,
    },
    Failure {
        kind: ErrorKind,
        reason: String,
        /// Set when the prediction was computed but publishing failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prediction: Option<PredictionEnvelope>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl RecordOutcome {
    fn new(index: usize, record: &RawRecord, outcome: Outcome) -> Self {
        Self {
            index,
            sequence_number: record.sequence_number().map(str::to_string),
            event_id: record.event_id().map(str::to_string),
            outcome,
        }
    }

    fn failed(index: usize, record: &RawRecord, err: &PredictError) -> Self {
        Self::new(
            index,
            record,
            Outcome::Failure {
                kind: err.kind(),
                reason: err.to_string(),
                prediction: None,
            },
        )
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            Outcome::Failure { kind, .. } => Some(*kind),
            Outcome::Success { .. } => None,
        }
    }

    /// Computed prediction, whether or not it was published.
    pub fn envelope(&self) -> Option<&PredictionEnvelope> {
        match &self.outcome {
            Outcome::Success { envelope } => Some(envelope),
            Outcome::Failure { prediction, .. } => prediction.as_ref(),
        }
    }

    /// Identifier the host uses to report a failed item. The index fallback
    /// is prefixed so it cannot be mistaken for a sequence number.
    pub fn item_identifier(&self) -> String {
        self.sequence_number
            .clone()
            .or_else(|| self.event_id.clone())
            .unwrap_or_else(|| format!("index-{}", self.index))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub invocation_id: Uuid,
    pub run_id: String,
    pub outcomes: Vec<RecordOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records were left unattempted because the time budget ran out
    pub truncated: bool,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// Every computed envelope in input order.
    pub fn envelopes(&self) -> Vec<&PredictionEnvelope> {
        self.outcomes.iter().filter_map(|o| o.envelope()).collect()
    }
}

/// Runs batches against a bundle, optionally publishing each prediction.
#[derive(Clone, Default)]
pub struct BatchHandler {
    sink: Option<Arc<dyn PredictionSink>>,
    time_budget: Option<Duration>,
}

impl BatchHandler {
    pub fn new(sink: Option<Arc<dyn PredictionSink>>) -> Self {
        Self {
            sink,
            time_budget: None,
        }
    }

    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn sink(&self) -> Option<&Arc<dyn PredictionSink>> {
        self.sink.as_ref()
    }

    pub fn handle(&self, records: &[RawRecord], bundle: &ModelBundle) -> BatchResult {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("batch", %invocation_id, run_id = %bundle.run_id, records = records.len());
        let _enter = span.enter();

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut outcomes = Vec::with_capacity(records.len());
        let mut truncated = false;

        for (index, record) in records.iter().enumerate() {
            if !truncated {
                if let Some(budget) = self.time_budget {
                    if clock.elapsed() >= budget {
                        warn!(index, remaining = records.len() - index, "time budget exhausted");
                        truncated = true;
                    }
                }
            }

            let outcome = if truncated {
                RecordOutcome::failed(index, record, &PredictError::DeadlineExceeded)
            } else {
                self.process(index, record, bundle)
            };
            outcomes.push(outcome);
        }

        let result = BatchResult {
            invocation_id,
            run_id: bundle.run_id.clone(),
            outcomes,
            started_at,
            finished_at: Utc::now(),
            truncated,
        };

        info!(
            succeeded = result.success_count(),
            failed = result.failure_count(),
            truncated,
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "batch processed"
        );
        result
    }

    fn process(&self, index: usize, record: &RawRecord, bundle: &ModelBundle) -> RecordOutcome {
        let envelope = match decode_record(record).and_then(|trip| predict_trip(bundle, &trip)) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(index, kind = %e.kind(), error = %e, "record failed");
                return RecordOutcome::failed(index, record, &e);
            }
        };

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.publish(&envelope) {
                warn!(index, sink = sink.target(), ride_id = %envelope.ride_id(), error = %e, "publish failed");
                return RecordOutcome::new(
                    index,
                    record,
                    Outcome::Failure {
                        kind: e.kind(),
                        reason: e.to_string(),
                        prediction: Some(envelope),
                    },
                );
            }
        }

        debug!(index, ride_id = %envelope.ride_id(), duration = envelope.ride_duration(), "record predicted");
        RecordOutcome::new(index, record, Outcome::Success { envelope })
    }
}

/// Run one batch with an optional publish target.
pub fn handle_batch(
    records: &[RawRecord],
    bundle: &ModelBundle,
    sink: Option<Arc<dyn PredictionSink>>,
) -> BatchResult {
    BatchHandler::new(sink).handle(records, bundle)
}
