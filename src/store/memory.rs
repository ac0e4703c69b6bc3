//! In-memory implementation of the durable name tier, used by tests and by
//! deployments that run with the database disabled. Not durable: all rows are
//! lost on restart.
use super::{
    FRESHNESS_WINDOW_DAYS, NameStore, NameStoreStats, StoreResult, SummonerNameRecord,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryNameStore {
    rows: RwLock<HashMap<String, SummonerNameRecord>>,
}

impl InMemoryNameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, timestamps included. Lets tests seed
    /// rows with arbitrary ages.
    pub async fn insert_record(&self, record: SummonerNameRecord) {
        self.rows.write().await.insert(record.puuid.clone(), record);
    }
}

#[async_trait]
impl NameStore for InMemoryNameStore {
    async fn get_fresh(&self, puuid: &str) -> StoreResult<Option<SummonerNameRecord>> {
        let rows = self.rows.read().await;
        let cutoff = Utc::now() - Duration::days(FRESHNESS_WINDOW_DAYS);
        Ok(rows
            .get(puuid)
            .filter(|record| record.updated_at > cutoff)
            .cloned())
    }

    async fn upsert(
        &self,
        puuid: &str,
        game_name: &str,
        tag_line: &str,
        summoner_id: Option<&str>,
        region: &str,
    ) -> StoreResult<()> {
        let mut rows = self.rows.write().await;
        let now = Utc::now();
        let created_at = rows.get(puuid).map(|r| r.created_at).unwrap_or(now);
        rows.insert(
            puuid.to_string(),
            SummonerNameRecord {
                puuid: puuid.to_string(),
                game_name: game_name.to_string(),
                tag_line: tag_line.to_string(),
                summoner_id: summoner_id.map(str::to_string),
                region: region.to_string(),
                updated_at: now,
                created_at,
            },
        );
        Ok(())
    }

    async fn stats(&self) -> StoreResult<NameStoreStats> {
        let rows = self.rows.read().await;
        let cutoff = Utc::now() - Duration::hours(24);
        let recent = rows.values().filter(|r| r.updated_at > cutoff).count() as i64;
        Ok(NameStoreStats {
            total: rows.len() as i64,
            recent,
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_then_get_fresh_round_trips() {
        let store = InMemoryNameStore::new();
        store
            .upsert("p1", "Player", "BR1", Some("s1"), "BR1")
            .await
            .expect("upsert");
        let record = store
            .get_fresh("p1")
            .await
            .expect("get")
            .expect("record present");
        assert_eq!(record.full_name(), "Player#BR1");
        assert_eq!(record.summoner_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn stale_rows_read_as_absent() {
        let store = InMemoryNameStore::new();
        let stale = Utc::now() - Duration::days(FRESHNESS_WINDOW_DAYS + 1);
        store
            .insert_record(SummonerNameRecord {
                puuid: "p1".into(),
                game_name: "Old".into(),
                tag_line: "BR1".into(),
                summoner_id: None,
                region: "BR1".into(),
                updated_at: stale,
                created_at: stale,
            })
            .await;
        assert!(store.get_fresh("p1").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn stats_count_total_and_recent_rows() {
        let store = InMemoryNameStore::new();
        assert!(store.health_check().await.is_ok());
        store
            .upsert("p1", "Fresh", "BR1", None, "BR1")
            .await
            .expect("upsert");
        let old = Utc::now() - Duration::days(2);
        store
            .insert_record(SummonerNameRecord {
                puuid: "p2".into(),
                game_name: "Older".into(),
                tag_line: "BR1".into(),
                summoner_id: None,
                region: "BR1".into(),
                updated_at: old,
                created_at: old,
            })
            .await;
        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.recent, 1);
    }

    #[tokio::test]
    async fn upsert_refreshes_a_stale_row() {
        let store = InMemoryNameStore::new();
        let stale = Utc::now() - Duration::days(FRESHNESS_WINDOW_DAYS + 1);
        store
            .insert_record(SummonerNameRecord {
                puuid: "p1".into(),
                game_name: "Old".into(),
                tag_line: "NA1".into(),
                summoner_id: None,
                region: "NA1".into(),
                updated_at: stale,
                created_at: stale,
            })
            .await;
        store
            .upsert("p1", "New", "BR1", None, "BR1")
            .await
            .expect("upsert");
        let record = store
            .get_fresh("p1")
            .await
            .expect("get")
            .expect("refreshed record");
        assert_eq!(record.full_name(), "New#BR1");
        assert_eq!(record.created_at, stale);
    }
}
