use crate::errors::{PredictError, PredictResult};
use crate::invocation::{InvocationResponse, Invoker};
use crate::transport::StreamEvent;
use axum::{
    body::Bytes,
    extract::Extension,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Path the serverless runtime emulator exposes for invocations
pub const INVOCATIONS_PATH: &str = "/2015-03-31/functions/function/invocations";

/// Build the local invocation router with health checks
pub fn build_router(invoker: Arc<Invoker>) -> Router {
    Router::new()
        .route(INVOCATIONS_PATH, post(invoke))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(invoker))
}

async fn invoke(
    Extension(invoker): Extension<Arc<Invoker>>,
    body: Bytes,
) -> PredictResult<Json<InvocationResponse>> {
    let event = StreamEvent::from_slice(&body)?;

    // model loading and publishing block; keep them off the async workers
    let response = tokio::task::spawn_blocking(move || invoker.invoke(&event))
        .await
        .map_err(|e| PredictError::io("invocation task", std::io::Error::other(e)))??;

    Ok(Json(response))
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn readyz(
    Extension(invoker): Extension<Arc<Invoker>>,
) -> PredictResult<Json<serde_json::Value>> {
    Ok(Json(serde_json::json!({ "ready": invoker.is_ready()? })))
}

/// Serve the router until ctrl-c.
pub async fn serve(invoker: Arc<Invoker>, host: &str, port: u16) -> PredictResult<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| PredictError::io(format!("binding {host}:{port}"), e))?;
    tracing::info!(%host, port, path = INVOCATIONS_PATH, "invocation endpoint listening");

    axum::serve(listener, build_router(invoker))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .map_err(|e| PredictError::io("serving invocations", e))
}
