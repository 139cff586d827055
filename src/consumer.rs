//! Polling stream consumer.
//!
//! Reads one shard and feeds each non-empty poll through the same batch
//! handler the invocation path uses. A poll failure ends the loop; restarting
//! is left to whatever supervises the process.

use crate::errors::{PredictError, PredictResult};
use crate::invocation::Invoker;
use crate::kinesis::{KinesisClient, ShardIteratorType};
use crate::transport::{RawRecord, StreamEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Result of one poll
#[derive(Debug)]
pub enum Poll {
    Records(Vec<RawRecord>),
    /// Shard closed and fully read
    Closed,
}

pub trait RecordSource {
    fn poll(&mut self) -> PredictResult<Poll>;

    fn describe(&self) -> String;
}

/// Reads one Kinesis shard through `GetShardIterator` / `GetRecords`.
pub struct KinesisShardSource {
    client: KinesisClient,
    stream_name: String,
    shard_id: String,
    start: ShardIteratorType,
    limit: u32,
    iterator: Option<String>,
    /// Last page had no next iterator
    closed: bool,
}

impl KinesisShardSource {
    pub fn new(
        client: KinesisClient,
        stream_name: impl Into<String>,
        shard_id: impl Into<String>,
        start: ShardIteratorType,
        limit: u32,
    ) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
            shard_id: shard_id.into(),
            start,
            limit,
            iterator: None,
            closed: false,
        }
    }

    fn source_error(&self, e: impl std::fmt::Display) -> PredictError {
        PredictError::stream_read(self.describe(), e.to_string())
    }
}

impl RecordSource for KinesisShardSource {
    fn poll(&mut self) -> PredictResult<Poll> {
        if self.closed {
            return Ok(Poll::Closed);
        }

        let iterator = match self.iterator.take() {
            Some(it) => it,
            None => self
                .client
                .get_shard_iterator(&self.stream_name, &self.shard_id, self.start)
                .map_err(|e| self.source_error(e))?,
        };

        let output = self
            .client
            .get_records(&iterator, self.limit)
            .map_err(|e| self.source_error(e))?;

        if let Some(lag) = output.millis_behind_latest {
            debug!(stream = %self.stream_name, lag_ms = lag, "shard lag");
        }

        let records = output
            .records
            .iter()
            .map(|r| RawRecord::from_encoded(&r.data, &r.sequence_number, r.partition_key.as_deref()))
            .collect::<Vec<_>>();

        match output.next_shard_iterator {
            Some(next) => self.iterator = Some(next),
            None => {
                debug!(source = %self.describe(), "no next iterator, shard is closed");
                self.closed = true;
            }
        }

        if self.closed && records.is_empty() {
            return Ok(Poll::Closed);
        }
        Ok(Poll::Records(records))
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.stream_name, self.shard_id)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsumerStats {
    pub polls: u64,
    pub batches: u64,
    pub records: u64,
    pub failures: u64,
}

pub struct StreamConsumer {
    invoker: Arc<Invoker>,
    idle_backoff: Duration,
    max_polls: Option<u64>,
}

impl StreamConsumer {
    pub fn new(invoker: Arc<Invoker>) -> Self {
        Self {
            invoker,
            idle_backoff: Duration::from_secs(1),
            max_polls: None,
        }
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_max_polls(mut self, max_polls: Option<u64>) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn run(&self, source: &mut dyn RecordSource) -> PredictResult<ConsumerStats> {
        // a missing bundle is fatal before any record is read
        self.invoker.warm()?;
        info!(source = %source.describe(), "stream consumer started");

        let mut stats = ConsumerStats::default();
        loop {
            if self.max_polls.is_some_and(|max| stats.polls >= max) {
                break;
            }
            stats.polls += 1;

            let records = match source.poll()? {
                Poll::Closed => {
                    info!(source = %source.describe(), "shard closed");
                    break;
                }
                Poll::Records(records) => records,
            };

            if records.is_empty() {
                std::thread::sleep(self.idle_backoff);
                continue;
            }

            let result = self.invoker.process(&StreamEvent { records })?;
            stats.batches += 1;
            stats.records += result.len() as u64;
            stats.failures += result.failure_count() as u64;
        }

        info!(
            polls = stats.polls,
            batches = stats.batches,
            records = stats.records,
            failures = stats.failures,
            "stream consumer stopped"
        );
        Ok(stats)
    }
}
