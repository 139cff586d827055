//! End-to-end tests for the ride duration predictor
//!
//! These drive the whole pipeline from configuration to published output:
//! - artifact loading from a local bucket layout
//! - stream event decoding, featurization and prediction
//! - per-record failure isolation and partial-batch reporting
//! - JSON-lines publishing

mod common;

use common::{assert_close, ride_event, Workspace, RUN_ID};
use ride_predict::app_state::AppState;
use ride_predict::errors::ErrorKind;
use ride_predict::transport::StreamEvent;
use serde_json::json;

#[test]
fn reference_ride_end_to_end() {
    let ws = Workspace::new();
    let state = AppState::from_config(ws.config()).expect("predictor initializes");

    let event = StreamEvent::from_payloads([&ride_event(130, 205, 3.66, json!(256))]);
    let response = state.invoker.invoke(&event).expect("invocation succeeds");

    assert_eq!(response.predictions.len(), 1);
    let prediction = &response.predictions[0];
    assert_eq!(prediction.model, "ride_duration_prediction_model");
    assert_eq!(prediction.version, RUN_ID);
    assert_close(prediction.ride_duration(), 21.64);
    assert!(response.batch_item_failures.is_empty());

    let published = ws.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0]["prediction"]["ride_id"], json!(256));
    assert_eq!(published[0]["version"], RUN_ID);
}

#[test]
fn missing_field_record_fails_alone() {
    let ws = Workspace::new();
    let state = AppState::from_config(ws.config()).unwrap();

    let records = [
        ride_event(130, 205, 3.66, json!(1)),
        ride_event(161, 236, 3.5, json!("test_ride_123")),
        json!({"ride": {"PULocationID": 130, "trip_distance": 2.0}, "ride_id": 999}),
        ride_event(43, 151, 1.2, json!(4)),
    ];
    let event = StreamEvent::from_payloads(records.iter());
    let result = state.invoker.process(&event).unwrap();

    assert_eq!(result.len(), 4);
    assert_eq!(result.success_count(), 3);
    assert_eq!(
        result.outcomes[2].failure_kind(),
        Some(ErrorKind::InvalidTripRecord)
    );

    let published = ws.published();
    let ids: Vec<_> = published
        .iter()
        .map(|p| p["prediction"]["ride_id"].clone())
        .collect();
    assert_eq!(ids, vec![json!(1), json!("test_ride_123"), json!(4)]);
}

#[test]
fn unknown_run_aborts_before_any_record() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.run_id = "nonexistent".to_string();
    let state = AppState::from_config(config).unwrap();

    let event = StreamEvent::from_payloads([&ride_event(130, 205, 3.66, json!(1))]);
    let err = state.invoker.invoke(&event).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ArtifactNotFound);
    assert!(ws.published().is_empty());
}

#[test]
fn test_run_skips_publishing() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.test_run = true;
    let state = AppState::from_config(config).unwrap();

    let event = StreamEvent::from_payloads([&ride_event(130, 205, 3.66, json!(1))]);
    let response = state.invoker.invoke(&event).unwrap();

    assert_eq!(response.predictions.len(), 1);
    assert!(ws.published().is_empty());
}

#[test]
fn raw_event_json_is_accepted() {
    let ws = Workspace::new();
    let state = AppState::from_config(ws.config()).unwrap();

    // hand-written event, as a stream trigger would deliver it
    let raw = br#"{
        "Records": [
            {
                "eventID": "shardId-000000000000:49630081666084879290581185630324770398608704880802529282",
                "kinesis": {
                    "partitionKey": "1",
                    "sequenceNumber": "49630081666084879290581185630324770398608704880802529282",
                    "data": "eyJyaWRlIjogeyJQVUxvY2F0aW9uSUQiOiAxMzAsICJET0xvY2F0aW9uSUQiOiAyMDUsICJ0cmlwX2Rpc3RhbmNlIjogMy42Nn0sICJyaWRlX2lkIjogMjU2fQ=="
                }
            },
            {"eventID": "broken", "kinesis": {"data": "not base64!"}}
        ]
    }"#;
    let event = StreamEvent::from_slice(raw).unwrap();
    let response = state.invoker.invoke(&event).unwrap();

    assert_eq!(response.predictions.len(), 1);
    assert_close(response.predictions[0].ride_duration(), 21.64);
    assert_eq!(response.batch_item_failures.len(), 1);
    assert_eq!(response.batch_item_failures[0].item_identifier, "broken");
}

#[test]
fn bundle_is_loaded_once_per_process() {
    let ws = Workspace::new();
    let state = AppState::from_config(ws.config()).unwrap();

    assert!(!state.invoker.is_ready().unwrap());
    let first = state.invoker.warm().unwrap();
    let second = state.invoker.warm().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert!(state.invoker.is_ready().unwrap());
}

#[test]
fn missing_artifact_source_is_a_config_error() {
    let ws = Workspace::new();
    let mut config = ws.config();
    config.artifact_root = None;
    let err = AppState::from_config(config).err().expect("config rejected");
    assert_eq!(err.kind(), ErrorKind::Internal);
}
