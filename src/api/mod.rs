//! HTTP API module.
//!
//! # Purpose
//! Route handlers and the shared admission guard. Every handler follows the
//! same skeleton: admission, parameter validation, client call, JSON
//! response, with errors shaped by `api::error`.
pub mod error;
pub mod league;
pub mod middleware;
pub mod players;
pub mod system;

use crate::api::error::ApiError;
use crate::api::middleware::RequestId;
use crate::app::AppState;
use crate::ratelimit::Decision;

/// Shared admission guard. Denials map to 429; counter-store failures map to
/// 500 and are never reported as denials.
pub(crate) async fn admit(
    state: &AppState,
    admission_key: &str,
    request_id: &RequestId,
) -> Result<(), ApiError> {
    match state.limiter.allow(admission_key).await {
        Ok(Decision::Allowed) => Ok(()),
        Ok(Decision::Denied) => Err(ApiError::rate_limited(request_id)),
        Err(err) => {
            tracing::error!(admission_key, error = %err, "rate limiter failure");
            Err(ApiError::internal("Internal server error", request_id))
        }
    }
}
