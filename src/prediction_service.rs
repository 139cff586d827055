//! Prediction against a loaded bundle.
//!
//! Stateless: every call reads the shared bundle and nothing else, so any
//! number of callers can use the same `Arc<ModelBundle>` at once.

use crate::envelope::PredictionEnvelope;
use crate::errors::PredictResult;
use crate::features::{prepare_features, FeatureVector};
use crate::model_cache::ModelBundle;
use crate::trip_record::TripRecord;
use tracing::trace;

/// Encode the features and run the regression model.
pub fn predict(bundle: &ModelBundle, features: &FeatureVector) -> PredictResult<f64> {
    let row = bundle.encoder.transform(features)?;
    let duration = bundle.model.predict(&row)?;
    trace!(pu_do = %features.pu_do, trip_distance = features.trip_distance, duration, "predicted");
    Ok(duration)
}

/// Featurize, predict and wrap a single trip.
pub fn predict_trip(bundle: &ModelBundle, trip: &TripRecord) -> PredictResult<PredictionEnvelope> {
    let features = prepare_features(trip);
    let duration = predict(bundle, &features)?;
    Ok(PredictionEnvelope::new(
        trip.ride_id.clone(),
        bundle.run_id.clone(),
        duration,
    ))
}
