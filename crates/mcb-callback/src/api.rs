use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::{sync::Arc, time::Instant};
use tracing::{error, warn};

use crate::{
    error::CallbackError,
    handler::{CallbackHandler, Endpoint, SIGNATURE_HEADER},
    metrics::CallbackMetrics,
};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<CallbackHandler>,
    pub metrics: Arc<CallbackMetrics>,
}

// POST /check
pub async fn post_check(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    dispatch(&state, Endpoint::Check, &headers, body)
}

// POST /rawdata_signature
pub async fn post_rawdata_signature(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    dispatch(&state, Endpoint::RawDataSignature, &headers, body)
}

fn dispatch(
    state: &AppState,
    endpoint: Endpoint,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();

    let outcome = match body {
        Ok(body) => {
            let signature = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok());
            state.handler.handle(endpoint, &body, signature)
        }
        Err(e) => {
            warn!(endpoint = endpoint.as_str(), error = %e, "read callback body failed");
            Err(CallbackError::BadRequest("read body failed"))
        }
    };

    state
        .metrics
        .observe(endpoint, &outcome, start.elapsed().as_secs_f64());

    match outcome {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(e) => e.into_response(),
    }
}

// GET /health
pub async fn get_health(State(state): State<AppState>) -> Response {
    use serde_json::json;

    let keys = state.handler.keys();
    let response = json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "decrypt_key_loaded": keys.decrypt().is_some(),
        "decrypt_key_source": keys.decrypt().map(|k| k.source().as_str()),
    });

    (StatusCode::OK, Json(response)).into_response()
}

// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export_prometheus() {
        Ok(text) => (
            StatusCode::OK,
            [("Content-Type", "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "encode metrics failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
