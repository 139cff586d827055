//! Error handling for the ride duration predictor
//!
//! Every failure the core can produce is a `PredictError`. Per-record failures
//! are projected onto an `ErrorKind` and recorded on the batch outcome; only
//! bundle-load failures ever reach the host runtime as an error.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Serializable failure category reported per record and to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DecodeError,
    InvalidTripRecord,
    ArtifactNotFound,
    ArtifactCorrupt,
    InferenceError,
    PublishError,
    DeadlineExceeded,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::InvalidTripRecord => "InvalidTripRecord",
            ErrorKind::ArtifactNotFound => "ArtifactNotFound",
            ErrorKind::ArtifactCorrupt => "ArtifactCorrupt",
            ErrorKind::InferenceError => "InferenceError",
            ErrorKind::PublishError => "PublishError",
            ErrorKind::DeadlineExceeded => "DeadlineExceeded",
            ErrorKind::Internal => "Internal",
        }
    }

    /// Whether redelivering the same bytes could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::PublishError | ErrorKind::DeadlineExceeded | ErrorKind::Internal
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the predictor
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Record decode failed: {message}")]
    Decode { message: String },

    #[error("Invalid trip record: {field} - {message}")]
    InvalidTripRecord { field: String, message: String },

    #[error("Model artifact not found: {location} - {reason}")]
    ArtifactNotFound { location: String, reason: String },

    #[error("Model artifact corrupt: {location} - {message}")]
    ArtifactCorrupt { location: String, message: String },

    #[error("Inference failed: {message}")]
    Inference { message: String },

    #[error("Publish to {target} failed: {message}")]
    Publish { target: String, message: String },

    #[error("Batch time budget exhausted before the record was processed")]
    DeadlineExceeded,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Reading from {stream} failed: {message}")]
    StreamRead { stream: String, message: String },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },
}

/// Result alias used throughout the crate.
pub type PredictResult<T> = Result<T, PredictError>;

impl PredictError {
    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create an invalid trip record error
    pub fn invalid_trip(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidTripRecord {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an artifact-not-found error
    pub fn artifact_not_found(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ArtifactNotFound {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Create an artifact-corrupt error
    pub fn artifact_corrupt(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ArtifactCorrupt {
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create an inference error
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// Create a publish error
    pub fn publish(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Publish {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a stream read error
    pub fn stream_read(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StreamRead {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::Decode { .. } => ErrorKind::DecodeError,
            PredictError::InvalidTripRecord { .. } => ErrorKind::InvalidTripRecord,
            PredictError::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            PredictError::ArtifactCorrupt { .. } => ErrorKind::ArtifactCorrupt,
            PredictError::Inference { .. } => ErrorKind::InferenceError,
            PredictError::Publish { .. } => ErrorKind::PublishError,
            PredictError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            PredictError::Config { .. }
            | PredictError::StreamRead { .. }
            | PredictError::Io { .. }
            | PredictError::Serialization { .. }
            | PredictError::MutexPoisoned { .. } => ErrorKind::Internal,
        }
    }

    /// Bundle-load failures abort the whole invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ArtifactNotFound | ErrorKind::ArtifactCorrupt | ErrorKind::Internal
        )
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::DecodeError | ErrorKind::InvalidTripRecord => StatusCode::BAD_REQUEST,
            ErrorKind::InferenceError => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::PublishError => StatusCode::BAD_GATEWAY,
            ErrorKind::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::ArtifactNotFound | ErrorKind::ArtifactCorrupt | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = serde_json::json!({
            "errorType": self.kind().as_str(),
            "errorMessage": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Helper trait for safe mutex operations
///
/// Returns a `PredictError` on poison instead of panicking.
pub trait SafeLock<T: ?Sized> {
    fn safe_lock(&self) -> PredictResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self) -> PredictResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| PredictError::MutexPoisoned {
            resource: "generic_mutex".to_string(),
        })
    }
}

impl From<std::io::Error> for PredictError {
    fn from(err: std::io::Error) -> Self {
        PredictError::io("io_operation", err)
    }
}

impl From<serde_json::Error> for PredictError {
    fn from(err: serde_json::Error) -> Self {
        PredictError::serialization("json_operation", err)
    }
}

impl From<figment::Error> for PredictError {
    fn from(err: figment::Error) -> Self {
        PredictError::config(err.to_string())
    }
}
