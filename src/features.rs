//! Feature preparation for the duration model.

use crate::trip_record::TripRecord;
use serde::{Deserialize, Serialize};

/// Composite pickup/dropoff feature name.
pub const PU_DO: &str = "PU_DO";
/// Numeric distance feature name.
pub const TRIP_DISTANCE: &str = "trip_distance";

/// Encoder-ready representation of one trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    #[serde(rename = "PU_DO")]
    pub pu_do: String,
    pub trip_distance: f64,
}

/// Value of a single named feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue<'a> {
    Categorical(&'a str),
    Numeric(f64),
}

impl FeatureVector {
    /// Named features in a stable order, as the encoder consumes them.
    pub fn entries(&self) -> [(&'static str, FeatureValue<'_>); 2] {
        [
            (PU_DO, FeatureValue::Categorical(&self.pu_do)),
            (TRIP_DISTANCE, FeatureValue::Numeric(self.trip_distance)),
        ]
    }
}

/// Derive the model features for a trip. Pure; the trip is left untouched.
pub fn prepare_features(trip: &TripRecord) -> FeatureVector {
    FeatureVector {
        pu_do: format!("{}_{}", trip.pickup_location_id, trip.dropoff_location_id),
        trip_distance: trip.trip_distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trip_record::RideId;
    use serde_json::json;

    #[test]
    fn builds_composite_location_feature() {
        let trip = TripRecord::new(130, 205, 3.66, RideId::from(256)).unwrap();
        let features = prepare_features(&trip);

        assert_eq!(
            serde_json::to_value(&features).unwrap(),
            json!({"PU_DO": "130_205", "trip_distance": 3.66})
        );
    }

    #[test]
    fn is_deterministic() {
        let trip = TripRecord::new(161, 236, 3.5, RideId::from("test_ride_123")).unwrap();
        assert_eq!(prepare_features(&trip), prepare_features(&trip));
        assert_eq!(trip.trip_distance, 3.5);
    }
}
