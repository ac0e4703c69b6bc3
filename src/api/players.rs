//! Player-scoped handlers: summoner lookup, composite player search, and
//! league entries by puuid.
use crate::api::admit;
use crate::api::error::ApiError;
use crate::api::middleware::RequestId;
use crate::app::AppState;
use crate::model::RANKED_QUEUE;
use crate::riot::RiotError;
use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub(crate) struct PuuidQuery {
    #[serde(default)]
    puuid: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchQuery {
    #[serde(default)]
    game_name: Option<String>,
    #[serde(default)]
    tag_line: Option<String>,
}

pub(crate) async fn get_summoner(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<PuuidQuery>,
) -> Result<Json<Value>, ApiError> {
    admit(&state, "summoner", &request_id).await?;
    let puuid = query.puuid.unwrap_or_default();
    if puuid.is_empty() {
        return Err(ApiError::validation("puuid is required", &request_id));
    }

    match state.riot.summoner_by_puuid(&puuid).await {
        Ok(summoner) => Ok(Json(summoner)),
        Err(RiotError::NotFound) => Err(ApiError::not_found("Summoner not found", &request_id)),
        Err(err) => {
            tracing::error!(puuid, error = %err, "summoner fetch failed");
            Err(ApiError::bad_gateway(
                "Failed to fetch summoner data",
                &request_id,
            ))
        }
    }
}

/// Composite lookup: resolve the account by riot id, then fetch the summoner
/// and league standings in parallel. The two secondary calls are best-effort
/// and render as `null` on failure.
pub(crate) async fn search_player(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, ApiError> {
    admit(&state, "search", &request_id).await?;
    let game_name = query.game_name.unwrap_or_default();
    if game_name.is_empty() {
        return Err(ApiError::validation("gameName is required", &request_id));
    }
    let tag_line = match query.tag_line {
        Some(tag) if !tag.is_empty() => tag,
        _ => state.home_region.clone(),
    };

    let account = match state.riot.account_by_riot_id(&game_name, &tag_line).await {
        Ok(account) => account,
        Err(RiotError::NotFound) => {
            return Err(ApiError::not_found("Player not found", &request_id));
        }
        Err(RiotError::Validation(message)) => {
            return Err(ApiError::validation(&message, &request_id));
        }
        Err(err) => {
            tracing::error!(game_name, tag_line, error = %err, "account search failed");
            return Err(ApiError::bad_gateway(
                "Failed to fetch account data",
                &request_id,
            ));
        }
    };

    let (summoner, league) = tokio::join!(
        state.riot.summoner_by_puuid(&account.puuid),
        state.riot.league_by_puuid(&account.puuid),
    );
    let summoner = summoner.ok();
    let league_entries = league.unwrap_or_default();
    let ranked_entry = league_entries
        .iter()
        .find(|entry| entry.queue_type == RANKED_QUEUE)
        .cloned();

    Ok(Json(json!({
        "account": account,
        "summoner": summoner,
        "puuid": account.puuid,
        "gameName": account.game_name,
        "tagLine": account.tag_line,
        "league": ranked_entry,
    })))
}

pub(crate) async fn league_by_puuid(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(query): Query<PuuidQuery>,
) -> Result<Json<Value>, ApiError> {
    admit(&state, "by-puuid", &request_id).await?;
    let puuid = query.puuid.unwrap_or_default();
    if puuid.is_empty() {
        return Err(ApiError::validation("puuid is required", &request_id));
    }

    match state.riot.league_by_puuid(&puuid).await {
        Ok(entries) => Ok(Json(json!(entries))),
        Err(RiotError::NotFound) => {
            Err(ApiError::not_found("League entries not found", &request_id))
        }
        Err(err) => {
            tracing::error!(puuid, error = %err, "league fetch failed");
            Err(ApiError::bad_gateway(
                "Failed to fetch league data",
                &request_id,
            ))
        }
    }
}
