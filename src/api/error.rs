//! API error types and helpers.
//!
//! # Purpose
//! Centralizes the HTTP error envelope: `{error, status, timestamp,
//! requestId}`, with the request id propagated from the tracking middleware
//! so log records and responses correlate.
use crate::api::middleware::RequestId;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub request_id: String,
}

impl ApiError {
    fn new(status: StatusCode, message: &str, request_id: &RequestId) -> Self {
        Self {
            status,
            message: message.to_string(),
            request_id: request_id.0.clone(),
        }
    }

    pub fn validation(message: &str, request_id: &RequestId) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, request_id)
    }

    pub fn rate_limited(request_id: &RequestId) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded", request_id)
    }

    pub fn not_found(message: &str, request_id: &RequestId) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, request_id)
    }

    pub fn bad_gateway(message: &str, request_id: &RequestId) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message, request_id)
    }

    pub fn internal(message: &str, request_id: &RequestId) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = json!({
            "error": self.message,
            "status": self.status.as_u16(),
            "timestamp": unix_now(),
            "requestId": self.request_id,
        });
        (self.status, Json(body)).into_response()
    }
}

/// Seconds since the Unix epoch; also used by the health endpoint.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
