//! Ranking handlers: the three high-tier buckets and paged entries.
use crate::api::admit;
use crate::api::error::ApiError;
use crate::api::middleware::RequestId;
use crate::app::AppState;
use crate::model::HighTier;
use crate::riot::RiotError;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

pub(crate) async fn challenger(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    high_tier(state, HighTier::Challenger, request_id).await
}

pub(crate) async fn grandmaster(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    high_tier(state, HighTier::Grandmaster, request_id).await
}

pub(crate) async fn master(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<Value>, ApiError> {
    high_tier(state, HighTier::Master, request_id).await
}

async fn high_tier(
    state: AppState,
    tier: HighTier,
    request_id: RequestId,
) -> Result<Json<Value>, ApiError> {
    admit(&state, tier.as_str(), &request_id).await?;
    match state.riot.league(tier).await {
        Ok(list) => Ok(Json(json!(list))),
        Err(RiotError::NotFound) => Err(ApiError::not_found(
            &format!("{} league not found", tier.as_str()),
            &request_id,
        )),
        Err(err) => {
            tracing::error!(tier = tier.as_str(), error = %err, "league fetch failed");
            Err(ApiError::bad_gateway(
                &format!("Failed to fetch {} league", tier.as_str()),
                &request_id,
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntriesQuery {
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    division: Option<String>,
    // Captured as a string so non-numeric values coerce to the default
    // instead of failing extraction.
    #[serde(default)]
    page: Option<String>,
}

pub(crate) async fn entries(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<EntriesQuery>,
) -> Result<Json<Value>, ApiError> {
    admit(&state, "entries", &request_id).await?;
    let tier = query.tier.unwrap_or_default();
    let division = query.division.unwrap_or_default();
    if tier.is_empty() || division.is_empty() {
        return Err(ApiError::validation(
            "tier and division are required",
            &request_id,
        ));
    }
    // Non-numeric or non-positive pages silently coerce to the first page.
    let page = query
        .page
        .as_deref()
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1);

    match state.riot.league_entries(&tier, &division, page).await {
        Ok(result) => Ok(Json(json!(result))),
        Err(RiotError::NotFound) => {
            Err(ApiError::not_found("League entries not found", &request_id))
        }
        Err(err) => {
            tracing::error!(tier, division, page, error = %err, "entries fetch failed");
            Err(ApiError::bad_gateway(
                "Failed to fetch league entries",
                &request_id,
            ))
        }
    }
}
