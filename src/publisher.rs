// Prediction sinks: where envelopes go once a record has been scored

use crate::envelope::PredictionEnvelope;
use crate::errors::{PredictError, PredictResult, SafeLock};
use crate::kinesis::KinesisClient;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Destination for published predictions
pub trait PredictionSink: Send + Sync {
    fn publish(&self, envelope: &PredictionEnvelope) -> PredictResult<()>;

    /// Name of the destination, for logs and error messages
    fn target(&self) -> &str;
}

/// `PutRecord` to a Kinesis-compatible stream, partitioned by ride id
pub struct KinesisSink {
    client: KinesisClient,
    stream_name: String,
}

impl KinesisSink {
    pub fn new(client: KinesisClient, stream_name: impl Into<String>) -> Self {
        Self {
            client,
            stream_name: stream_name.into(),
        }
    }
}

impl PredictionSink for KinesisSink {
    fn publish(&self, envelope: &PredictionEnvelope) -> PredictResult<()> {
        let data = envelope.to_json_bytes()?;
        let key = envelope.partition_key();
        let output = self
            .client
            .put_record(&self.stream_name, &data, &key)
            .map_err(|e| PredictError::publish(&self.stream_name, e.to_string()))?;
        debug!(
            stream = %self.stream_name,
            partition_key = %key,
            shard_id = %output.shard_id,
            sequence_number = %output.sequence_number,
            "prediction published"
        );
        Ok(())
    }

    fn target(&self) -> &str {
        &self.stream_name
    }
}

/// Appends one JSON envelope per line to a local file
pub struct JsonlFileSink {
    path: PathBuf,
    target: String,
    file: Mutex<File>,
}

impl JsonlFileSink {
    pub fn open(path: impl AsRef<Path>) -> PredictResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| PredictError::io(format!("opening {}", path.display()), e))?;
        Ok(Self {
            target: path.display().to_string(),
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PredictionSink for JsonlFileSink {
    fn publish(&self, envelope: &PredictionEnvelope) -> PredictResult<()> {
        let mut line = envelope.to_json_bytes()?;
        line.push(b'\n');
        let mut file = self.file.safe_lock()?;
        file.write_all(&line)
            .and_then(|_| file.flush())
            .map_err(|e| PredictError::publish(&self.target, e.to_string()))
    }

    fn target(&self) -> &str {
        &self.target
    }
}
