//! Request-scoped middleware: CORS, request ids, and request metrics.
use crate::metrics::Metrics;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Per-request correlation id, generated here and carried in request
/// extensions so handlers can echo it in error envelopes.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Assign a request id, log request start/completion, and record the request
/// in the metrics aggregates.
pub async fn track_requests(
    State(metrics): State<Arc<Metrics>>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    tracing::info!(%method, path, request_id, "request started");

    let mut response = next.run(request).await;

    let status = response.status();
    let duration = started.elapsed();
    tracing::info!(
        %method,
        path,
        request_id,
        status = status.as_u16(),
        duration_ms = duration.as_millis() as u64,
        "request completed"
    );
    metrics.record_request(&path, duration, status.as_u16());

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// CORS policy: echo the request origin (falling back to `*`), allow the
/// fixed method/header set, and short-circuit preflights with an empty 200.
pub async fn cors(request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("*")
        .to_string();

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors_headers(&mut response, &origin);
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(&mut response, &origin);
    response
}

fn apply_cors_headers(response: &mut Response, origin: &str) {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_str(origin).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}
