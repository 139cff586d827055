use crate::errors::{PredictError, PredictResult};
use crate::trip_record::RideId;
use serde::{Deserialize, Serialize};

/// Model name stamped on every published prediction.
pub const MODEL_NAME: &str = "ride_duration_prediction_model";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RidePrediction {
    pub ride_duration: f64,
    pub ride_id: RideId,
}

/// Outbound prediction record, serialized exactly as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionEnvelope {
    pub model: String,
    /// Run id of the bundle that produced the prediction
    pub version: String,
    pub prediction: RidePrediction,
}

impl PredictionEnvelope {
    pub fn new(ride_id: RideId, run_id: impl Into<String>, ride_duration: f64) -> Self {
        Self {
            model: MODEL_NAME.to_string(),
            version: run_id.into(),
            prediction: RidePrediction {
                ride_duration,
                ride_id,
            },
        }
    }

    pub fn ride_id(&self) -> &RideId {
        &self.prediction.ride_id
    }

    pub fn run_id(&self) -> &str {
        &self.version
    }

    pub fn ride_duration(&self) -> f64 {
        self.prediction.ride_duration
    }

    pub fn partition_key(&self) -> String {
        self.prediction.ride_id.partition_key()
    }

    pub fn to_json_bytes(&self) -> PredictResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| PredictError::serialization("encoding prediction envelope", e))
    }
}
