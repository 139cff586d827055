//! Trip records and ride identifiers.
//!
//! The decoded payload is validated here, once, into a typed `TripRecord`.
//! Anything past this boundary can assume the required fields are present.

use crate::errors::{PredictError, PredictResult};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

/// Caller-supplied ride identifier. Keeps its JSON type so it round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RideId {
    Number(Number),
    Text(String),
}

impl RideId {
    pub fn from_value(value: &Value) -> PredictResult<Self> {
        match value {
            Value::Number(n) => Ok(RideId::Number(n.clone())),
            Value::String(s) => Ok(RideId::Text(s.clone())),
            Value::Null => Err(PredictError::invalid_trip("ride_id", "must not be null")),
            other => Err(PredictError::invalid_trip(
                "ride_id",
                format!("expected number or string, got {}", json_type(other)),
            )),
        }
    }

    /// Partition key used when publishing.
    pub fn partition_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RideId::Number(n) => write!(f, "{n}"),
            RideId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RideId {
    fn from(value: i64) -> Self {
        RideId::Number(Number::from(value))
    }
}

impl From<&str> for RideId {
    fn from(value: &str) -> Self {
        RideId::Text(value.to_string())
    }
}

/// One ride, as received from the stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripRecord {
    #[serde(rename = "PULocationID")]
    pub pickup_location_id: u32,
    #[serde(rename = "DOLocationID")]
    pub dropoff_location_id: u32,
    pub trip_distance: f64,
    #[serde(skip)]
    pub ride_id: RideId,
}

impl TripRecord {
    pub fn new(
        pickup_location_id: u32,
        dropoff_location_id: u32,
        trip_distance: f64,
        ride_id: RideId,
    ) -> PredictResult<Self> {
        if !trip_distance.is_finite() {
            return Err(PredictError::invalid_trip(
                "trip_distance",
                "must be a finite number",
            ));
        }
        Ok(Self {
            pickup_location_id,
            dropoff_location_id,
            trip_distance,
            ride_id,
        })
    }

    /// Validate a decoded ride event: `{"ride": {...}, "ride_id": ...}`.
    pub fn from_event(event: &Value) -> PredictResult<Self> {
        let obj = event
            .as_object()
            .ok_or_else(|| PredictError::invalid_trip("$", "event must be a JSON object"))?;

        let ride_id = obj
            .get("ride_id")
            .ok_or_else(|| PredictError::invalid_trip("ride_id", "missing"))
            .and_then(RideId::from_value)?;

        let ride = obj
            .get("ride")
            .ok_or_else(|| PredictError::invalid_trip("ride", "missing"))?
            .as_object()
            .ok_or_else(|| PredictError::invalid_trip("ride", "must be a JSON object"))?;

        let pickup = location_id(ride.get("PULocationID"), "PULocationID")?;
        let dropoff = location_id(ride.get("DOLocationID"), "DOLocationID")?;
        let distance = distance(ride.get("trip_distance"))?;

        Self::new(pickup, dropoff, distance, ride_id)
    }

    /// Parse and validate a JSON document holding one ride event.
    pub fn from_json_slice(bytes: &[u8]) -> PredictResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| PredictError::decode(format!("payload is not valid JSON: {e}")))?;
        Self::from_event(&value)
    }
}

fn location_id(value: Option<&Value>, field: &str) -> PredictResult<u32> {
    let value = match value {
        None | Some(Value::Null) => return Err(PredictError::invalid_trip(field, "missing")),
        Some(v) => v,
    };

    let parsed = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u32::try_from(u).ok()
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u32::MAX as f64)
                    .map(|f| f as u32)
            }
        }
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| {
        PredictError::invalid_trip(field, format!("not a location id: {value}"))
    })
}

fn distance(value: Option<&Value>) -> PredictResult<f64> {
    let field = "trip_distance";
    let value = match value {
        None | Some(Value::Null) => return Err(PredictError::invalid_trip(field, "missing")),
        Some(v) => v,
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|d| d.is_finite())
        .ok_or_else(|| PredictError::invalid_trip(field, format!("not a number: {value}")))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    #[test]
    fn parses_reference_event() {
        let event = json!({
            "ride": {"PULocationID": 130, "DOLocationID": 205, "trip_distance": 3.66},
            "ride_id": 256
        });
        let trip = TripRecord::from_event(&event).unwrap();
        assert_eq!(trip.pickup_location_id, 130);
        assert_eq!(trip.dropoff_location_id, 205);
        assert_eq!(trip.trip_distance, 3.66);
        assert_eq!(trip.ride_id, RideId::from(256));
    }

    #[test]
    fn accepts_numeric_strings_and_integral_floats() {
        let event = json!({
            "ride": {"PULocationID": "43", "DOLocationID": 151.0, "trip_distance": "1.2"},
            "ride_id": "test_ride_002"
        });
        let trip = TripRecord::from_event(&event).unwrap();
        assert_eq!(trip.pickup_location_id, 43);
        assert_eq!(trip.dropoff_location_id, 151);
        assert_eq!(trip.trip_distance, 1.2);
        assert_eq!(trip.ride_id.to_string(), "test_ride_002");
    }

    #[test]
    fn missing_fields_are_invalid() {
        let event = json!({"ride": {"PULocationID": 130}, "ride_id": 999});
        let err = TripRecord::from_event(&event).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTripRecord);
        assert!(err.to_string().contains("DOLocationID"));
    }

    #[test]
    fn ride_id_is_never_synthesized() {
        let event = json!({"ride": {"PULocationID": 1, "DOLocationID": 2, "trip_distance": 1.0}});
        let err = TripRecord::from_event(&event).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTripRecord);

        let event = json!({
            "ride": {"PULocationID": 1, "DOLocationID": 2, "trip_distance": 1.0},
            "ride_id": {"nested": true}
        });
        assert!(TripRecord::from_event(&event).is_err());
    }

    #[test]
    fn fractional_or_negative_location_rejected() {
        for bad in [json!(1.5), json!(-3), json!("abc"), json!(true)] {
            let event = json!({
                "ride": {"PULocationID": bad, "DOLocationID": 2, "trip_distance": 1.0},
                "ride_id": 1
            });
            assert!(TripRecord::from_event(&event).is_err());
        }
    }

    #[test]
    fn ride_id_keeps_json_type() {
        let numeric: RideId = serde_json::from_value(json!(256)).unwrap();
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!(256));
        assert_eq!(numeric.partition_key(), "256");

        let text: RideId = serde_json::from_value(json!("256")).unwrap();
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("256"));
        assert_ne!(numeric, text);
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = TripRecord::from_json_slice(b"{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeError);
    }
}
