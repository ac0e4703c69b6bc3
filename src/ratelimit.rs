//! Distributed admission control over a shared counter store.
//!
//! # Purpose
//! Fixed-window rate limiting coordinated across all gateway replicas. Each
//! admission decision is one counter round-trip per rule; there is no local
//! token reservoir. Windows are approximate: a burst of up to twice the
//! capacity can land across a window boundary, accepted in exchange for
//! single-round-trip admission.
use crate::config::RateLimitRule;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Atomic increment-and-expire on named keys in a shared store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the integer at `key` and return the post-increment value.
    /// When the counter is created (post-increment value of exactly 1) its
    /// expiry is set to `ttl`; the TTL is never refreshed afterwards, so the
    /// bucket dies `ttl` after its first increment.
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> anyhow::Result<i64>;
}

pub struct RedisCounter {
    conn: ConnectionManager,
}

impl RedisCounter {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CounterStore for RedisCounter {
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> anyhow::Result<i64> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1).await?;
        if count == 1 {
            conn.expire::<_, bool>(key, ttl.as_secs() as i64).await?;
        }
        Ok(count)
    }
}

/// In-process counter store for tests and single-replica development.
#[derive(Default)]
pub struct MemoryCounter {
    buckets: Mutex<HashMap<String, (i64, Instant)>>,
}

impl MemoryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a bucket at an arbitrary count, as if previous requests had
    /// already incremented it within the current window.
    pub fn preload(&self, key: &str, count: i64, ttl: Duration) {
        self.buckets
            .lock()
            .expect("counter lock")
            .insert(key.to_string(), (count, Instant::now() + ttl));
    }

    pub fn value(&self, key: &str) -> Option<i64> {
        self.buckets
            .lock()
            .expect("counter lock")
            .get(key)
            .map(|(count, _)| *count)
    }
}

#[async_trait]
impl CounterStore for MemoryCounter {
    async fn incr_with_ttl(&self, key: &str, ttl: Duration) -> anyhow::Result<i64> {
        let mut buckets = self.buckets.lock().expect("counter lock");
        let now = Instant::now();
        let entry = buckets.entry(key.to_string()).or_insert((0, now + ttl));
        if now >= entry.1 {
            // Bucket generation expired; the increment recreates it.
            *entry = (0, now + ttl);
        }
        entry.0 += 1;
        Ok(entry.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

/// Admission over an ordered list of fixed-window rules. Rules are evaluated
/// in order and evaluation stops on the first denial so later buckets are not
/// inflated by requests that were already rejected.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    prefix: String,
    rules: Vec<RateLimitRule>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, prefix: String, rules: Vec<RateLimitRule>) -> Self {
        Self {
            store,
            prefix,
            rules,
        }
    }

    /// Decide admission for one logical key. A request whose increment lands
    /// exactly at a rule's capacity is admitted; capacity + 1 is denied.
    /// Counter-store failures surface as errors, never as denials.
    pub async fn allow(&self, admission_key: &str) -> anyhow::Result<Decision> {
        for rule in &self.rules {
            let bucket = format!("{}:{}:{}", self.prefix, admission_key, rule.window_secs);
            let count = self
                .store
                .incr_with_ttl(&bucket, Duration::from_secs(rule.window_secs))
                .await?;
            if count > i64::from(rule.capacity) {
                return Ok(Decision::Denied);
            }
        }
        Ok(Decision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_RATE_LIMIT_RULES;
    use futures::future::join_all;

    fn limiter(store: Arc<MemoryCounter>, rules: Vec<RateLimitRule>) -> RateLimiter {
        RateLimiter::new(store, "tft:ratelimit".into(), rules)
    }

    #[tokio::test(start_paused = true)]
    async fn admits_up_to_capacity_and_denies_past_it() {
        let store = Arc::new(MemoryCounter::new());
        let limiter = limiter(
            store,
            vec![RateLimitRule {
                capacity: 3,
                window_secs: 1,
            }],
        );
        for _ in 0..3 {
            assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Allowed);
        }
        assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn denial_stops_before_inflating_later_buckets() {
        let store = Arc::new(MemoryCounter::new());
        store.preload("tft:ratelimit:search:1", 20, Duration::from_secs(1));
        let limiter = limiter(
            store.clone(),
            vec![
                RateLimitRule {
                    capacity: 20,
                    window_secs: 1,
                },
                RateLimitRule {
                    capacity: 100,
                    window_secs: 120,
                },
            ],
        );
        assert_eq!(limiter.allow("search").await.expect("allow"), Decision::Denied);
        // The long-window bucket was never touched.
        assert_eq!(store.value("tft:ratelimit:search:120"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_keys_do_not_share_budget() {
        let store = Arc::new(MemoryCounter::new());
        let limiter = limiter(
            store,
            vec![RateLimitRule {
                capacity: 1,
                window_secs: 1,
            }],
        );
        assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Allowed);
        assert_eq!(limiter.allow("entries").await.expect("allow"), Decision::Allowed);
        assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Denied);
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_expiry_opens_a_new_window() {
        let store = Arc::new(MemoryCounter::new());
        let limiter = limiter(
            store,
            vec![RateLimitRule {
                capacity: 1,
                window_secs: 1,
            }],
        );
        assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Allowed);
        assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Denied);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(limiter.allow("summoner").await.expect("allow"), Decision::Allowed);
    }

    #[tokio::test]
    async fn concurrent_callers_never_exceed_capacity() {
        let store = Arc::new(MemoryCounter::new());
        let limiter = Arc::new(limiter(
            store,
            vec![RateLimitRule {
                capacity: 20,
                window_secs: 60,
            }],
        ));
        let calls = (0..40).map(|_| {
            let limiter = limiter.clone();
            async move { limiter.allow("summoner").await.expect("allow") }
        });
        let decisions = join_all(calls).await;
        let admitted = decisions
            .iter()
            .filter(|d| **d == Decision::Allowed)
            .count();
        assert_eq!(admitted, 20);
    }

    struct FailingCounter;

    #[async_trait]
    impl CounterStore for FailingCounter {
        async fn incr_with_ttl(&self, _key: &str, _ttl: Duration) -> anyhow::Result<i64> {
            Err(anyhow::anyhow!("counter store unreachable"))
        }
    }

    #[tokio::test]
    async fn store_failure_is_an_error_not_a_denial() {
        let limiter = RateLimiter::new(
            Arc::new(FailingCounter),
            "tft:ratelimit".into(),
            DEFAULT_RATE_LIMIT_RULES.to_vec(),
        );
        assert!(limiter.allow("summoner").await.is_err());
    }
}
