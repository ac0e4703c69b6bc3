//! Periodic ranking refresh publisher.
//!
//! # Purpose
//! Keeps the high-tier buckets warm: every tick, one refresh task per bucket
//! is published for the home region and consumed by the ranking workers.
//! Publish failures are logged and left for the next tick; the scheduler
//! itself never retries.
use crate::bus::{MessageBus, SUBJECT_RANKING_UPDATE};
use crate::model::{HighTier, RankingRefreshTask};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Spawn the scheduler fiber. Only called when the bus connected at
/// bootstrap.
pub fn spawn_scheduler(bus: Arc<dyn MessageBus>, region: String, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REFRESH_INTERVAL);
        // The first interval tick fires immediately; the buckets were just
        // fetched or will be on first request, so skip it.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => publish_refresh_tasks(&bus, &region).await,
            }
        }
    });
    tracing::info!("ranking refresh scheduler started");
}

async fn publish_refresh_tasks(bus: &Arc<dyn MessageBus>, region: &str) {
    for tier in HighTier::ALL {
        let task = RankingRefreshTask {
            kind: tier.into(),
            region: region.to_string(),
            tier: None,
            division: None,
            page: None,
        };
        let payload = match serde_json::to_vec(&task) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(tier = tier.as_str(), error = %err, "failed to encode refresh task");
                continue;
            }
        };
        if let Err(err) = bus.publish(SUBJECT_RANKING_UPDATE, payload).await {
            tracing::warn!(tier = tier.as_str(), error = %err, "failed to publish refresh task");
        }
    }
}
