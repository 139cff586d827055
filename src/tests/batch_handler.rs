use super::test_utils::{assert_close, bundle, ride_event, FailingSink, RecordingSink, RUN_ID};
use crate::batch_handler::{handle_batch, BatchHandler, Outcome};
use crate::errors::ErrorKind;
use crate::publisher::PredictionSink;
use crate::transport::{RawRecord, StreamEvent};
use crate::trip_record::RideId;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn reference_record_is_predicted() {
    let event = StreamEvent::from_payloads([&ride_event(130, 205, 3.66, json!(256))]);
    let result = handle_batch(&event.records, &bundle(), None);

    assert_eq!(result.len(), 1);
    let envelope = result.outcomes[0].envelope().expect("prediction");
    assert_eq!(envelope.model, "ride_duration_prediction_model");
    assert_eq!(envelope.run_id(), RUN_ID);
    assert_eq!(envelope.ride_id(), &RideId::from(256));
    assert_close(envelope.ride_duration(), 21.64);
}

#[test]
fn one_bad_record_does_not_sink_the_batch() {
    let records = [
        ride_event(130, 205, 3.66, json!(1)),
        json!({"ride": {"PULocationID": 130}, "ride_id": 999}),
        ride_event(161, 236, 1.0, json!("two")),
        ride_event(43, 151, 2.5, json!(3)),
    ];
    let event = StreamEvent::from_payloads(records.iter());
    let result = handle_batch(&event.records, &bundle(), None);

    assert_eq!(result.len(), 4);
    assert_eq!(result.success_count(), 3);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(
        result.outcomes[1].failure_kind(),
        Some(ErrorKind::InvalidTripRecord)
    );

    // order follows the input
    let indices: Vec<usize> = result.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(
        result.outcomes[2].envelope().unwrap().ride_id(),
        &RideId::from("two")
    );
    // unseen PU_DO contributes nothing: 5 + 4*2.5
    assert_close(result.outcomes[3].envelope().unwrap().ride_duration(), 15.0);
}

#[test]
fn undecodable_records_are_decode_errors() {
    let records = vec![
        RawRecord(json!({"kinesis": {"data": "%%%"}, "eventID": "e-1"})),
        RawRecord(json!("just a string")),
        RawRecord::from_data(b"{not json", "7", None),
    ];
    let result = handle_batch(&records, &bundle(), None);

    for outcome in &result.outcomes {
        assert_eq!(outcome.failure_kind(), Some(ErrorKind::DecodeError));
    }
    assert_eq!(result.outcomes[0].item_identifier(), "e-1");
    assert_eq!(result.outcomes[1].item_identifier(), "index-1");
    assert_eq!(result.outcomes[2].item_identifier(), "7");
}

#[test]
fn index_fallback_does_not_collide_with_sequence_numbers() {
    let records = vec![
        RawRecord::from_data(b"{not json", "1", None),
        RawRecord(json!({"kinesis": {"data": "%%%"}})),
    ];
    let result = handle_batch(&records, &bundle(), None);

    let ids: Vec<String> = result.outcomes.iter().map(|o| o.item_identifier()).collect();
    assert_eq!(ids, vec!["1".to_string(), "index-1".to_string()]);
}

#[test]
fn predictions_are_published_with_ride_id_partition_key() {
    let sink = Arc::new(RecordingSink::default());
    let records = [
        ride_event(130, 205, 3.66, json!(256)),
        ride_event(161, 236, 3.5, json!("test_ride_123")),
    ];
    let event = StreamEvent::from_payloads(records.iter());
    let result = handle_batch(
        &event.records,
        &bundle(),
        Some(sink.clone() as Arc<dyn PredictionSink>),
    );

    assert_eq!(result.success_count(), 2);
    let published = sink.envelopes();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].0, "256");
    assert_eq!(published[1].0, "test_ride_123");
    assert_eq!(
        serde_json::to_value(&published[0].1).unwrap()["prediction"]["ride_id"],
        json!(256)
    );
}

#[test]
fn publish_failure_keeps_the_prediction() {
    let sink: Arc<dyn PredictionSink> = Arc::new(FailingSink {
        reject: vec!["2".to_string()],
    });
    let records = [
        ride_event(130, 205, 3.66, json!(1)),
        ride_event(130, 205, 3.66, json!(2)),
    ];
    let event = StreamEvent::from_payloads(records.iter());
    let result = handle_batch(&event.records, &bundle(), Some(sink));

    assert!(result.outcomes[0].is_success());
    match &result.outcomes[1].outcome {
        Outcome::Failure {
            kind, prediction, ..
        } => {
            assert_eq!(*kind, ErrorKind::PublishError);
            let kept = prediction.as_ref().expect("prediction kept");
            assert_close(kept.ride_duration(), 21.64);
        }
        other => panic!("expected publish failure, got {other:?}"),
    }
    assert_eq!(result.envelopes().len(), 2);
}

#[test]
fn identical_input_gives_identical_predictions() {
    let event = StreamEvent::from_payloads([&ride_event(161, 236, 3.5, json!(9))]);
    let b = bundle();
    let first = handle_batch(&event.records, &b, None);
    let second = handle_batch(&event.records, &b, None);
    assert_eq!(first.outcomes, second.outcomes);
    assert_ne!(first.invocation_id, second.invocation_id);
}

#[test]
fn exhausted_budget_marks_remaining_records() {
    let records = [
        ride_event(130, 205, 3.66, json!(1)),
        ride_event(130, 205, 3.66, json!(2)),
    ];
    let event = StreamEvent::from_payloads(records.iter());
    let handler = BatchHandler::new(None).with_time_budget(Duration::ZERO);
    let result = handler.handle(&event.records, &bundle());

    assert!(result.truncated);
    assert_eq!(result.len(), 2);
    assert!(result
        .outcomes
        .iter()
        .all(|o| o.failure_kind() == Some(ErrorKind::DeadlineExceeded)));
}

#[test]
fn empty_batch_is_fine() {
    let result = handle_batch(&[], &bundle(), None);
    assert!(result.is_empty());
    assert!(!result.truncated);
}
