//! Health and metrics endpoints.
use crate::api::error::unix_now;
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

pub(crate) async fn healthz(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": unix_now(),
        "services": state.services,
    }))
}

pub(crate) async fn metrics_snapshot(State(state): State<AppState>) -> Json<Value> {
    Json(state.metrics.snapshot())
}
