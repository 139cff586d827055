//! Library root for the `ride_predict` crate
//! Stream-triggered ride duration prediction: decode, featurize, predict, publish.

// Core error handling
pub mod errors;

// Records and features
pub mod envelope;
pub mod features;
pub mod transport;
pub mod trip_record;

// Model access
pub mod artifact_store;
pub mod encoder;
pub mod model_cache;
pub mod regression;

// Prediction & batch handling
pub mod batch_handler;
pub mod prediction_service;
pub mod scoring;

// Output stream & sinks
pub mod kinesis;
pub mod publisher;

// Host adapters
pub mod app_state;
pub mod consumer;
pub mod invocation;
pub mod web;

// Configuration, CLI & logging
pub mod cli;
pub mod config;
pub mod config_loader;
pub mod telemetry;


pub use batch_handler::{handle_batch, BatchHandler, BatchResult, RecordOutcome};
pub use envelope::PredictionEnvelope;
pub use errors::{ErrorKind, PredictError, PredictResult};
pub use features::{prepare_features, FeatureVector};
pub use invocation::{InvocationResponse, Invoker};
pub use model_cache::{ModelBundle, ModelCache};
pub use prediction_service::predict;
pub use trip_record::{RideId, TripRecord};
