//! Fast-tier key/value store abstraction.
//!
//! # Purpose
//! The shared volatile tier of the read-through cache. The trait exists so
//! request handling can be exercised against an in-memory backend while
//! deployments share a Redis instance across replicas.
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum KvError {
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type KvResult<T> = Result<T, KvError>;

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    /// `ttl = None` stores the value without an expiry.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KvResult<()>;
}

/// Redis-backed fast tier shared by all gateway replicas. The connection
/// manager multiplexes and reconnects internally; clones are cheap handles
/// onto the same connection.
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|err| KvError::Backend(err.into()))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KvResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs())
                .await
                .map_err(|err| KvError::Backend(err.into()))?,
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(|err| KvError::Backend(err.into()))?,
        }
        Ok(())
    }
}

/// In-memory fast tier for tests and single-process development. Expiry is
/// checked lazily on read against the tokio clock so paused-time tests can
/// exercise TTL behaviour deterministically.
#[derive(Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock().expect("kv lock");
        match entries.get(key) {
            Some((_, Some(deadline))) if Instant::now() >= *deadline => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> KvResult<()> {
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .expect("kv lock")
            .insert(key.to_string(), (value, deadline));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn memory_kv_round_trips_within_ttl() {
        let kv = MemoryKv::new();
        kv.set("k", "v".into(), Some(Duration::from_secs(60)))
            .await
            .expect("set");
        assert_eq!(kv.get("k").await.expect("get"), Some("v".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn memory_kv_expires_after_ttl() {
        let kv = MemoryKv::new();
        kv.set("k", "v".into(), Some(Duration::from_secs(60)))
            .await
            .expect("set");
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(kv.get("k").await.expect("get"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn memory_kv_unbounded_entries_survive() {
        let kv = MemoryKv::new();
        kv.set("k", "v".into(), None).await.expect("set");
        tokio::time::advance(Duration::from_secs(7 * 24 * 3600)).await;
        assert_eq!(kv.get("k").await.expect("get"), Some("v".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn memory_kv_overwrites_value_and_ttl() {
        let kv = MemoryKv::new();
        kv.set("k", "old".into(), Some(Duration::from_secs(1)))
            .await
            .expect("set");
        kv.set("k", "new".into(), Some(Duration::from_secs(120)))
            .await
            .expect("set");
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(kv.get("k").await.expect("get"), Some("new".to_string()));
    }
}
