//! Two-tier read-through cache adapter.
//!
//! # Purpose
//! Typed JSON caching over the fast tier plus the specialised name path that
//! spans both tiers. Cache failures never fail a request: backend errors and
//! undecodable payloads degrade to a miss and are logged, and when caching is
//! globally disabled every read misses and every write is a no-op while the
//! durable name tier (if enabled) is still consulted.
use crate::kv::KvStore;
use crate::metrics::Metrics;
use crate::model::NAME_LOADING;
use crate::store::NameStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Root literal of every cache fingerprint.
pub const CACHE_ROOT: &str = "tft";

/// Fast-tier lifetime of a resolved name.
pub const NAME_TTL: Duration = Duration::from_secs(24 * 3600);

/// Per-kind fast-tier TTL table. `None` means the entry never expires.
pub fn ttl_for_kind(kind: &str) -> Option<Duration> {
    match kind {
        "summoner" | "league_by_puuid" => Some(Duration::from_secs(3600)),
        "account_by_puuid" | "account_by_name" => Some(Duration::from_secs(6 * 3600)),
        "challenger" | "grandmaster" | "master" | "entries" => Some(Duration::from_secs(30 * 60)),
        "summoner_name" => Some(NAME_TTL),
        "match" => None,
        _ => Some(Duration::from_secs(30 * 60)),
    }
}

/// Split a composite `name#tag` on the last `#`. A missing `#` defaults the
/// tag to the home region code.
pub fn split_name_tag(full: &str, home_region: &str) -> (String, String) {
    match full.rsplit_once('#') {
        Some((name, tag)) => (name.to_string(), tag.to_string()),
        None => (full.to_string(), home_region.to_string()),
    }
}

pub struct CacheManager {
    kv: Arc<dyn KvStore>,
    names: Option<Arc<dyn NameStore>>,
    enabled: bool,
    home_region: String,
    metrics: Arc<Metrics>,
}

impl CacheManager {
    pub fn new(
        kv: Arc<dyn KvStore>,
        names: Option<Arc<dyn NameStore>>,
        enabled: bool,
        home_region: String,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            kv,
            names,
            enabled,
            home_region,
            metrics,
        }
    }

    /// Canonical fingerprint `tft:<kind>:<region>[:p…]`. Params are joined
    /// verbatim with `:`; callers guarantee they contain no `:`.
    pub fn fingerprint(&self, kind: &str, region: &str, params: &[&str]) -> String {
        let mut key = format!("{CACHE_ROOT}:{kind}:{region}");
        for param in params {
            key.push(':');
            key.push_str(param);
        }
        key
    }

    /// Typed fast-tier read. Backend errors and undecodable payloads count as
    /// misses; a bad payload is left in place for its TTL rather than evicted.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.enabled {
            return None;
        }
        match self.kv.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    self.metrics.record_cache_hit(key);
                    Some(value)
                }
                Err(err) => {
                    tracing::warn!(key, error = %err, "cached payload failed to decode");
                    self.metrics.record_cache_miss(key);
                    None
                }
            },
            Ok(None) => {
                self.metrics.record_cache_miss(key);
                None
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed");
                self.metrics.record_cache_miss(key);
                None
            }
        }
    }

    /// Typed fast-tier write. Failures are logged, never surfaced.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if !self.enabled {
            return;
        }
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode cache payload");
                return;
            }
        };
        if let Err(err) = self.kv.set(key, raw, ttl).await {
            tracing::warn!(key, error = %err, "cache write failed");
        }
    }

    fn name_key(&self, puuid: &str) -> String {
        self.fingerprint("summoner_name", &self.home_region, &[puuid])
    }

    /// Resolve a display name across both tiers. A fast-tier value that is
    /// empty or still carries the loading sentinel is treated as unknown so
    /// the durable tier can answer; a durable hit re-populates the fast tier.
    pub async fn get_name(&self, puuid: &str) -> Option<String> {
        let key = self.name_key(puuid);
        if self.enabled {
            match self.kv.get(&key).await {
                Ok(Some(value)) if !value.is_empty() && value != NAME_LOADING => {
                    self.metrics.record_cache_hit(&key);
                    return Some(value);
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(key, error = %err, "name cache read failed");
                }
            }
        }
        let names = self.names.as_ref()?;
        match names.get_fresh(puuid).await {
            Ok(Some(record)) => {
                let full = record.full_name();
                if self.enabled {
                    if let Err(err) = self.kv.set(&key, full.clone(), Some(NAME_TTL)).await {
                        tracing::warn!(key, error = %err, "name cache write-back failed");
                    }
                }
                Some(full)
            }
            Ok(None) => None,
            Err(err) => {
                // Durable-tier failure degrades to "name unknown".
                tracing::warn!(puuid, error = %err, "name store lookup failed");
                None
            }
        }
    }

    /// Write a resolved name through both tiers.
    pub async fn set_name(&self, puuid: &str, full_name: &str) {
        if self.enabled {
            let key = self.name_key(puuid);
            if let Err(err) = self
                .kv
                .set(&key, full_name.to_string(), Some(NAME_TTL))
                .await
            {
                tracing::warn!(key, error = %err, "name cache write failed");
            }
        }
        if let Some(names) = &self.names {
            let (game_name, tag_line) = split_name_tag(full_name, &self.home_region);
            if let Err(err) = names
                .upsert(puuid, &game_name, &tag_line, None, &self.home_region)
                .await
            {
                tracing::warn!(puuid, error = %err, "name store upsert failed");
            }
        }
    }
}
