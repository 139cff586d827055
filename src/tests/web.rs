use super::test_utils::{ride_event, ArtifactDir, RecordingSink, BUCKET, RUN_ID};
use crate::batch_handler::BatchHandler;
use crate::invocation::Invoker;
use crate::publisher::PredictionSink;
use crate::transport::StreamEvent;
use crate::web::{build_router, INVOCATIONS_PATH};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt; // for .oneshot()

fn app(artifacts: &ArtifactDir, run_id: &str) -> (Router, Arc<Invoker>) {
    let (cache, _) = artifacts.cache();
    let sink: Arc<dyn PredictionSink> = Arc::new(RecordingSink::default());
    let invoker = Arc::new(Invoker::new(
        cache,
        BUCKET,
        run_id,
        BatchHandler::new(Some(sink)),
    ));
    (build_router(invoker.clone()), invoker)
}

fn invocation(body: String) -> Request<Body> {
    Request::builder()
        .uri(INVOCATIONS_PATH)
        .method("POST")
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn invocation_returns_predictions() {
    let artifacts = ArtifactDir::with_fixture();
    let (app, _) = app(&artifacts, RUN_ID);

    let event = StreamEvent::from_payloads([&ride_event(130, 205, 3.66, json!(256))]);
    let response = app
        .oneshot(invocation(serde_json::to_string(&event).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["predictions"][0]["model"], "ride_duration_prediction_model");
    assert_eq!(body["predictions"][0]["version"], RUN_ID);
    assert_eq!(body["predictions"][0]["prediction"]["ride_id"], json!(256));
    assert_eq!(body["batchItemFailures"], json!([]));
}

#[tokio::test]
async fn failed_records_are_reported_as_item_failures() {
    let artifacts = ArtifactDir::with_fixture();
    let (app, _) = app(&artifacts, RUN_ID);

    let records = [
        ride_event(130, 205, 3.66, json!(1)),
        json!({"ride": {"PULocationID": 130}, "ride_id": 999}),
    ];
    let event = StreamEvent::from_payloads(records.iter());
    let response = app
        .oneshot(invocation(serde_json::to_string(&event).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["predictions"].as_array().unwrap().len(), 1);
    assert_eq!(body["batchItemFailures"], json!([{"itemIdentifier": "1"}]));
}

#[tokio::test]
async fn missing_model_is_a_500() {
    let artifacts = ArtifactDir::with_fixture();
    let (app, _) = app(&artifacts, "nonexistent");

    let event = StreamEvent::from_payloads([&ride_event(130, 205, 3.66, json!(1))]);
    let response = app
        .oneshot(invocation(serde_json::to_string(&event).unwrap()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["errorType"], "ArtifactNotFound");
}

#[tokio::test]
async fn malformed_event_is_a_400() {
    let artifacts = ArtifactDir::with_fixture();
    let (app, _) = app(&artifacts, RUN_ID);

    let response = app
        .oneshot(invocation("{not json".to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["errorType"], "DecodeError");
}

#[tokio::test]
async fn readiness_follows_bundle_load() {
    let artifacts = ArtifactDir::with_fixture();
    let (app, invoker) = app(&artifacts, RUN_ID);

    let ready = |app: Router| async move {
        let req = Request::builder()
            .uri("/readyz")
            .body(Body::empty())
            .unwrap();
        json_body(app.oneshot(req).await.unwrap()).await["ready"].clone()
    };

    assert_eq!(ready(app.clone()).await, json!(false));
    invoker.warm().expect("warm bundle");
    assert_eq!(ready(app.clone()).await, json!(true));

    let req = Request::builder()
        .uri("/healthz")
        .body(Body::empty())
        .unwrap();
    let health = json_body(app.oneshot(req).await.unwrap()).await;
    assert_eq!(health, json!({"status": "ok"}));
}
