//! Durable name tier.
//!
//! # Purpose
//! The only cache kind with a durable backing store is the summoner name:
//! resolving a name costs an upstream account lookup under a tight rate
//! budget, so resolved names are kept in Postgres with a freshness window and
//! written back to the fast tier on hit.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

pub mod memory;
pub mod postgres;

/// Rows older than this are treated as absent.
pub const FRESHNESS_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct SummonerNameRecord {
    pub puuid: String,
    pub game_name: String,
    pub tag_line: String,
    pub summoner_id: Option<String>,
    pub region: String,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SummonerNameRecord {
    pub fn full_name(&self) -> String {
        format!("{}#{}", self.game_name, self.tag_line)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NameStoreStats {
    pub total: i64,
    pub recent: i64,
}

#[async_trait]
pub trait NameStore: Send + Sync {
    /// Fetch the record for `puuid` if it exists and is younger than the
    /// freshness window.
    async fn get_fresh(&self, puuid: &str) -> StoreResult<Option<SummonerNameRecord>>;

    /// Insert or update a record, touching `updated_at`. The puuid is the
    /// natural primary key.
    async fn upsert(
        &self,
        puuid: &str,
        game_name: &str,
        tag_line: &str,
        summoner_id: Option<&str>,
        region: &str,
    ) -> StoreResult<()>;

    /// Row counts for the health/metrics surface: total rows and rows touched
    /// within the last 24 hours.
    async fn stats(&self) -> StoreResult<NameStoreStats>;

    async fn health_check(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}
