//! Bus consumers: the name-fetch worker and the ranking-refresh worker.
//!
//! # Purpose
//! The asynchronous half of the serving pipeline. Both handlers are
//! stateless and idempotent: the bus delivers at least once, so a redelivered
//! message must converge to the same store contents. Failures are logged and
//! the message is dropped; retry happens by republishing, never in-band.
use crate::bus::{
    GROUP_NAME_WORKERS, GROUP_RANKING_WORKERS, MessageBus, SUBJECT_NAME_FETCH,
    SUBJECT_RANKING_UPDATE,
};
use crate::cache::{CacheManager, ttl_for_kind};
use crate::model::{HighTier, NameFetchTask, RankingRefreshTask, RefreshKind};
use crate::riot::RiotApi;
use futures::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub struct WorkerContext {
    pub riot: Arc<dyn RiotApi>,
    pub cache: Arc<CacheManager>,
    pub region: String,
}

/// Resolve one player's display name and write it through the cache tiers.
pub async fn handle_name_fetch(ctx: &WorkerContext, payload: &[u8]) {
    let task: NameFetchTask = match serde_json::from_slice(payload) {
        Ok(task) => task,
        Err(err) => {
            tracing::warn!(error = %err, "dropping undecodable name fetch task");
            return;
        }
    };

    // Idempotent skip: a redelivery or a faster replica already resolved it.
    if let Some(existing) = ctx.cache.get_name(&task.puuid).await {
        if !existing.is_empty() {
            tracing::debug!(puuid = task.puuid, "name already cached, skipping");
            return;
        }
    }

    match ctx.riot.account_by_puuid(&task.puuid).await {
        Ok(account) if !account.game_name.is_empty() => {
            let full = account.full_name();
            ctx.cache.set_name(&task.puuid, &full).await;
            tracing::debug!(puuid = task.puuid, name = full, "name resolved");
        }
        Ok(_) => {
            tracing::warn!(puuid = task.puuid, "account payload carried no game name");
        }
        Err(err) => {
            tracing::warn!(puuid = task.puuid, error = %err, "name fetch failed");
        }
    }
}

/// Repopulate one cached ranking bucket ahead of its expiry.
pub async fn handle_ranking_refresh(ctx: &WorkerContext, payload: &[u8]) {
    let task: RankingRefreshTask = match serde_json::from_slice(payload) {
        Ok(task) => task,
        Err(err) => {
            tracing::warn!(error = %err, "dropping undecodable ranking refresh task");
            return;
        }
    };

    match task.kind {
        RefreshKind::Challenger => refresh_high_tier(ctx, HighTier::Challenger).await,
        RefreshKind::Grandmaster => refresh_high_tier(ctx, HighTier::Grandmaster).await,
        RefreshKind::Master => refresh_high_tier(ctx, HighTier::Master).await,
        RefreshKind::Entries => {
            let (Some(tier), Some(division)) = (task.tier.as_deref(), task.division.as_deref())
            else {
                tracing::warn!("entries refresh task missing tier or division");
                return;
            };
            let page = task.page.unwrap_or(1);
            if let Err(err) = ctx.riot.league_entries(tier, division, page).await {
                tracing::warn!(tier, division, page, error = %err, "entries refresh failed");
            }
        }
    }
}

async fn refresh_high_tier(ctx: &WorkerContext, tier: HighTier) {
    match ctx.riot.refresh_league(tier).await {
        Ok(list) => {
            let key = ctx.cache.fingerprint(tier.as_str(), &ctx.region, &[]);
            ctx.cache
                .set_json(&key, &list, ttl_for_kind(tier.as_str()))
                .await;
            tracing::info!(tier = tier.as_str(), entries = list.entries.len(), "bucket refreshed");
        }
        Err(err) => {
            tracing::warn!(tier = tier.as_str(), error = %err, "ranking refresh failed");
        }
    }
}

/// Subscribe both queue groups and spawn their consume loops. Each loop
/// processes one message at a time and stops at shutdown.
pub async fn start_workers(
    bus: Arc<dyn MessageBus>,
    ctx: Arc<WorkerContext>,
    shutdown: CancellationToken,
) -> Result<Vec<JoinHandle<()>>, crate::bus::BusError> {
    let mut name_stream = bus
        .subscribe_queue(SUBJECT_NAME_FETCH, GROUP_NAME_WORKERS)
        .await?;
    let mut ranking_stream = bus
        .subscribe_queue(SUBJECT_RANKING_UPDATE, GROUP_RANKING_WORKERS)
        .await?;

    let name_ctx = ctx.clone();
    let name_shutdown = shutdown.clone();
    let name_worker = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = name_shutdown.cancelled() => break,
                message = name_stream.next() => match message {
                    Some(payload) => handle_name_fetch(&name_ctx, &payload).await,
                    None => break,
                },
            }
        }
    });

    let ranking_shutdown = shutdown;
    let ranking_worker = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = ranking_shutdown.cancelled() => break,
                message = ranking_stream.next() => match message {
                    Some(payload) => handle_ranking_refresh(&ctx, &payload).await,
                    None => break,
                },
            }
        }
    });

    tracing::info!("bus workers started");
    Ok(vec![name_worker, ranking_worker])
}
