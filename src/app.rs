//! HTTP application wiring.
//!
//! # Purpose
//! Builds the axum router, configures the middleware stack, and defines the
//! shared application state injected into handlers. Centralizing route
//! composition keeps `main` small and the full surface testable with
//! in-memory backends.
use crate::api;
use crate::metrics::Metrics;
use crate::ratelimit::RateLimiter;
use crate::riot::RiotApi;
use axum::Router;
use axum::middleware;
use axum::routing::get;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Per-dependency status strings surfaced by `/healthz`, resolved at
/// bootstrap.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatuses {
    pub redis: String,
    pub postgres: String,
    pub nats: String,
}

#[derive(Clone)]
pub struct AppState {
    pub riot: Arc<dyn RiotApi>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: Arc<Metrics>,
    pub services: ServiceStatuses,
    pub home_region: String,
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
            )
        });

    Router::new()
        .route("/healthz", get(api::system::healthz))
        .route("/metrics", get(api::system::metrics_snapshot))
        .route("/summoner", get(api::players::get_summoner))
        .route("/search/player", get(api::players::search_player))
        .route("/league/challenger", get(api::league::challenger))
        .route("/league/grandmaster", get(api::league::grandmaster))
        .route("/league/master", get(api::league::master))
        .route("/league/entries", get(api::league::entries))
        .route("/league/by-puuid", get(api::players::league_by_puuid))
        .layer(middleware::from_fn(api::middleware::cors))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            api::middleware::track_requests,
        ))
        .layer(trace_layer)
        .with_state(state)
}
