//! Display-name enrichment for ranking rows.
//!
//! # Purpose
//! Fills each row's display-name slot without blowing the upstream rate
//! budget: cache first, then a bounded number of inline account lookups
//! spaced by a smoothing delay, and everything beyond the inline budget is
//! published to the name workers while the row serves the loading sentinel.
use crate::bus::{MessageBus, SUBJECT_NAME_FETCH};
use crate::cache::CacheManager;
use crate::model::{LeagueEntry, NAME_LOADING, NAME_UNKNOWN, NameFetchTask};
use crate::riot::RiotApi;
use std::sync::Arc;
use std::time::Duration;

/// Inline lookup budget per enrichment pass; everything past it spills onto
/// the bus.
pub const MAX_INLINE_LOOKUPS: usize = 10;

/// Delay between consecutive inline lookups, smoothing them under the
/// upstream's per-second limit.
pub const INLINE_LOOKUP_DELAY: Duration = Duration::from_millis(150);

pub struct NameEnricher {
    cache: Arc<CacheManager>,
    bus: Option<Arc<dyn MessageBus>>,
    region: String,
}

impl NameEnricher {
    pub fn new(cache: Arc<CacheManager>, bus: Option<Arc<dyn MessageBus>>, region: String) -> Self {
        Self { cache, bus, region }
    }

    /// Enrich `entries` in input order, stamping every row with `tier`.
    /// Rows without an opaque id are marked [`NAME_UNKNOWN`] and never cost a
    /// lookup. Inline lookups stop after [`MAX_INLINE_LOOKUPS`]; spilled rows
    /// are marked [`NAME_LOADING`] and handed to the worker pool.
    pub async fn enrich(
        &self,
        accounts: &dyn RiotApi,
        mut entries: Vec<LeagueEntry>,
        tier: &str,
    ) -> Vec<LeagueEntry> {
        let mut inline_lookups = 0usize;
        let mut cache_hits = 0usize;
        let mut errors = 0usize;

        for entry in entries.iter_mut() {
            entry.tier = tier.to_string();

            if entry.has_resolved_name() {
                continue;
            }
            let puuid = entry.unique_id().to_string();
            if puuid.is_empty() {
                entry.summoner_name = NAME_UNKNOWN.to_string();
                continue;
            }

            if let Some(name) = self.cache.get_name(&puuid).await {
                entry.summoner_name = name;
                cache_hits += 1;
                continue;
            }

            if inline_lookups >= MAX_INLINE_LOOKUPS {
                self.spill(&puuid).await;
                entry.summoner_name = NAME_LOADING.to_string();
                continue;
            }

            if inline_lookups > 0 {
                tokio::time::sleep(INLINE_LOOKUP_DELAY).await;
            }
            match accounts.account_by_puuid(&puuid).await {
                Ok(account) if !account.game_name.is_empty() => {
                    let full = account.full_name();
                    self.cache.set_name(&puuid, &full).await;
                    entry.summoner_name = full;
                }
                Ok(_) => {
                    errors += 1;
                    self.spill(&puuid).await;
                    entry.summoner_name = NAME_LOADING.to_string();
                }
                Err(err) => {
                    tracing::debug!(puuid, error = %err, "inline name lookup failed");
                    errors += 1;
                    self.spill(&puuid).await;
                    entry.summoner_name = NAME_LOADING.to_string();
                }
            }
            inline_lookups += 1;
        }

        tracing::debug!(
            tier,
            rows = entries.len(),
            inline_lookups,
            cache_hits,
            errors,
            "enrichment pass complete"
        );
        entries
    }

    /// Fire-and-forget handoff to the name workers. Publish failures are
    /// logged and never surfaced to the request.
    async fn spill(&self, puuid: &str) {
        let Some(bus) = &self.bus else {
            return;
        };
        let task = NameFetchTask {
            puuid: puuid.to_string(),
            region: self.region.clone(),
        };
        match serde_json::to_vec(&task) {
            Ok(payload) => {
                if let Err(err) = bus.publish(SUBJECT_NAME_FETCH, payload).await {
                    tracing::warn!(puuid, error = %err, "failed to publish name fetch task");
                }
            }
            Err(err) => {
                tracing::warn!(puuid, error = %err, "failed to encode name fetch task");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{GROUP_NAME_WORKERS, MemoryBus};
    use crate::kv::MemoryKv;
    use crate::metrics::Metrics;
    use crate::model::{Account, HighTier, LeagueEntriesPage, LeagueList};
    use crate::riot::{RiotError, RiotResult};
    use async_trait::async_trait;
    use futures::{FutureExt, StreamExt};
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts account lookups; fails them all when `fail` is set.
    #[derive(Default)]
    struct CountingAccounts {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingAccounts {
        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RiotApi for CountingAccounts {
        async fn summoner_by_puuid(&self, _puuid: &str) -> RiotResult<Value> {
            unreachable!("enrichment only performs account lookups")
        }

        async fn account_by_puuid(&self, puuid: &str) -> RiotResult<Account> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RiotError::Upstream {
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            Ok(Account {
                puuid: puuid.to_string(),
                game_name: format!("Name-{puuid}"),
                tag_line: "BR1".into(),
            })
        }

        async fn account_by_riot_id(
            &self,
            _game_name: &str,
            _tag_line: &str,
        ) -> RiotResult<Account> {
            unreachable!("enrichment only performs account lookups")
        }

        async fn league(&self, _tier: HighTier) -> RiotResult<LeagueList> {
            unreachable!("enrichment only performs account lookups")
        }

        async fn refresh_league(&self, _tier: HighTier) -> RiotResult<LeagueList> {
            unreachable!("enrichment only performs account lookups")
        }

        async fn league_entries(
            &self,
            _tier: &str,
            _division: &str,
            _page: u32,
        ) -> RiotResult<LeagueEntriesPage> {
            unreachable!("enrichment only performs account lookups")
        }

        async fn league_by_puuid(&self, _puuid: &str) -> RiotResult<Vec<LeagueEntry>> {
            unreachable!("enrichment only performs account lookups")
        }
    }

    fn cache(kv: Arc<MemoryKv>) -> Arc<CacheManager> {
        Arc::new(CacheManager::new(
            kv,
            None,
            true,
            "BR1".into(),
            Arc::new(Metrics::new()),
        ))
    }

    fn row(puuid: &str, name: &str) -> LeagueEntry {
        LeagueEntry {
            league_id: String::new(),
            puuid: puuid.into(),
            summoner_id: String::new(),
            summoner_name: name.into(),
            queue_type: String::new(),
            tier: String::new(),
            rank: String::new(),
            league_points: 0,
            wins: 0,
            losses: 0,
            hot_streak: false,
            veteran: false,
            fresh_blood: false,
            inactive: false,
            mini_series: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rows_without_an_id_are_marked_unknown_without_lookups() {
        let enricher = NameEnricher::new(cache(Arc::new(MemoryKv::new())), None, "BR1".into());
        let accounts = CountingAccounts::default();
        let enriched = enricher
            .enrich(&accounts, vec![row("", ""), row("", NAME_LOADING)], "MASTER")
            .await;
        assert!(enriched.iter().all(|e| e.summoner_name == NAME_UNKNOWN));
        assert!(enriched.iter().all(|e| e.tier == "MASTER"));
        assert_eq!(accounts.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_names_are_left_alone() {
        let enricher = NameEnricher::new(cache(Arc::new(MemoryKv::new())), None, "BR1".into());
        let accounts = CountingAccounts::default();
        let enriched = enricher
            .enrich(&accounts, vec![row("p1", "Faker#KR1")], "CHALLENGER")
            .await;
        assert_eq!(enriched[0].summoner_name, "Faker#KR1");
        assert_eq!(accounts.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_names_cost_no_lookups() {
        let cache = cache(Arc::new(MemoryKv::new()));
        cache.set_name("p1", "Cached#BR1").await;
        let enricher = NameEnricher::new(cache, None, "BR1".into());
        let accounts = CountingAccounts::default();
        let enriched = enricher
            .enrich(&accounts, vec![row("p1", "")], "CHALLENGER")
            .await;
        assert_eq!(enriched[0].summoner_name, "Cached#BR1");
        assert_eq!(accounts.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn twelve_cold_rows_spill_past_the_inline_budget() {
        let bus = Arc::new(MemoryBus::new());
        let mut spilled = bus
            .subscribe_queue(SUBJECT_NAME_FETCH, GROUP_NAME_WORKERS)
            .await
            .expect("subscribe");
        let cache = cache(Arc::new(MemoryKv::new()));
        let enricher = NameEnricher::new(cache, Some(bus.clone()), "BR1".into());
        let accounts = CountingAccounts::default();

        let rows: Vec<_> = (0..12).map(|i| row(&format!("p{i}"), "")).collect();
        let enriched = enricher.enrich(&accounts, rows, "CHALLENGER").await;

        assert_eq!(accounts.count(), MAX_INLINE_LOOKUPS);
        for entry in &enriched[..MAX_INLINE_LOOKUPS] {
            assert!(entry.has_resolved_name());
        }
        for entry in &enriched[MAX_INLINE_LOOKUPS..] {
            assert_eq!(entry.summoner_name, NAME_LOADING);
        }

        for expected in ["p10", "p11"] {
            let payload = spilled.next().await.expect("spilled task");
            let task: NameFetchTask = serde_json::from_slice(&payload).expect("decode");
            assert_eq!(task.puuid, expected);
            assert_eq!(task.region, "BR1");
        }
        assert!(spilled.next().now_or_never().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_lookups_write_through_the_name_cache() {
        let kv = Arc::new(MemoryKv::new());
        let cache = cache(kv.clone());
        let enricher = NameEnricher::new(cache.clone(), None, "BR1".into());
        let accounts = CountingAccounts::default();
        let enriched = enricher
            .enrich(&accounts, vec![row("p1", "")], "GRANDMASTER")
            .await;
        assert_eq!(enriched[0].summoner_name, "Name-p1#BR1");
        assert_eq!(cache.get_name("p1").await, Some("Name-p1#BR1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_lookups_count_against_the_budget_and_spill() {
        let bus = Arc::new(MemoryBus::new());
        let mut spilled = bus
            .subscribe_queue(SUBJECT_NAME_FETCH, GROUP_NAME_WORKERS)
            .await
            .expect("subscribe");
        let enricher = NameEnricher::new(
            cache(Arc::new(MemoryKv::new())),
            Some(bus.clone()),
            "BR1".into(),
        );
        let accounts = CountingAccounts::failing();

        let rows: Vec<_> = (0..12).map(|i| row(&format!("p{i}"), "")).collect();
        let enriched = enricher.enrich(&accounts, rows, "MASTER").await;

        // Failures consume the inline budget too, so the upstream still sees
        // at most ten calls.
        assert_eq!(accounts.count(), MAX_INLINE_LOOKUPS);
        assert!(enriched.iter().all(|e| e.summoner_name == NAME_LOADING));
        let mut published = 0;
        while spilled.next().now_or_never().flatten().is_some() {
            published += 1;
        }
        assert_eq!(published, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_bus_degrades_to_loading_sentinels() {
        let enricher = NameEnricher::new(cache(Arc::new(MemoryKv::new())), None, "BR1".into());
        let accounts = CountingAccounts::failing();
        let enriched = enricher.enrich(&accounts, vec![row("p1", "")], "MASTER").await;
        assert_eq!(enriched[0].summoner_name, NAME_LOADING);
    }
}
