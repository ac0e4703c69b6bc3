//! Postgres-backed implementation of the durable name tier.
//!
//! # What this module is
//! Implements the `NameStore` trait over a shared Postgres instance (via
//! `sqlx`). All gateway replicas upsert into the same `summoner_names` table;
//! the puuid primary key makes concurrent upserts last-write-wins without any
//! application-level locking.
//!
//! # Freshness model
//! Reads apply the freshness predicate in SQL (`updated_at` within the last
//! seven days) rather than filtering in application code, so a stale row is
//! indistinguishable from a missing one to callers. Upserts always touch
//! `updated_at`, which restarts the window.
//!
//! # Operational notes
//! - Migrations run at startup via `sqlx::migrate!` so handlers can assume
//!   the schema exists; a migration failure fails bootstrap.
//! - Pool timeouts bound how long a request waits for a connection; failing
//!   fast beats hanging on an unhealthy database.
use super::{NameStore, NameStoreStats, StoreError, StoreResult, SummonerNameRecord};
use crate::config::PostgresConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// Row shape for the `summoner_names` table, kept separate from the domain
/// record so schema details stay localized to this module.
#[derive(Debug, Clone, FromRow)]
struct DbSummonerName {
    puuid: String,
    game_name: String,
    tag_line: String,
    summoner_id: Option<String>,
    region: String,
    updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<DbSummonerName> for SummonerNameRecord {
    fn from(row: DbSummonerName) -> Self {
        SummonerNameRecord {
            puuid: row.puuid,
            game_name: row.game_name,
            tag_line: row.tag_line,
            summoner_id: row.summoner_id,
            region: row.region,
            updated_at: row.updated_at,
            created_at: row.created_at,
        }
    }
}

pub struct PostgresNameStore {
    pool: PgPool,
}

impl PostgresNameStore {
    /// Connect, run migrations, and hand back a ready store.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let connect_options =
            PgConnectOptions::from_str(&pg.url()).map_err(|e| StoreError::Unexpected(e.into()))?;
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::Unexpected(e.into()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.into()))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl NameStore for PostgresNameStore {
    async fn get_fresh(&self, puuid: &str) -> StoreResult<Option<SummonerNameRecord>> {
        let row = sqlx::query_as::<_, DbSummonerName>(
            r#"SELECT puuid, game_name, tag_line, summoner_id, region, updated_at, created_at
               FROM summoner_names
               WHERE puuid = $1 AND updated_at > NOW() - INTERVAL '7 days'"#,
        )
        .bind(puuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.into()))?;
        Ok(row.map(SummonerNameRecord::from))
    }

    async fn upsert(
        &self,
        puuid: &str,
        game_name: &str,
        tag_line: &str,
        summoner_id: Option<&str>,
        region: &str,
    ) -> StoreResult<()> {
        sqlx::query(
            r#"INSERT INTO summoner_names (puuid, game_name, tag_line, summoner_id, region)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (puuid) DO UPDATE SET
                   game_name = $2,
                   tag_line = $3,
                   summoner_id = $4,
                   region = $5,
                   updated_at = NOW()"#,
        )
        .bind(puuid)
        .bind(game_name)
        .bind(tag_line)
        .bind(summoner_id)
        .bind(region)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.into()))?;
        Ok(())
    }

    async fn stats(&self) -> StoreResult<NameStoreStats> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM summoner_names")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.into()))?;
        let recent = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM summoner_names WHERE updated_at > NOW() - INTERVAL '24 hours'",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Unexpected(e.into()))?;
        Ok(NameStoreStats { total, recent })
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(e.into()))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
