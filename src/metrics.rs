//! In-process metrics aggregates.
//!
//! # Purpose
//! Request, error, cache, and queue-depth counters served as JSON by the
//! `/metrics` endpoint and summarised periodically to the log. A single
//! reader-writer lock guards the aggregates: handlers and workers write,
//! the metrics endpoint and the reporter read.
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Default)]
struct MetricsInner {
    request_count: HashMap<String, u64>,
    request_durations_ms: HashMap<String, Vec<u64>>,
    error_count: HashMap<String, u64>,
    cache_hits: u64,
    cache_misses: u64,
    queue_depths: HashMap<String, i64>,
}

impl MetricsInner {
    fn hit_rate_percent(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64 * 100.0
    }
}

#[derive(Default)]
pub struct Metrics {
    inner: RwLock<MetricsInner>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, endpoint: &str, duration: Duration, status: u16) {
        let mut inner = self.inner.write().expect("metrics lock");
        *inner.request_count.entry(endpoint.to_string()).or_default() += 1;
        inner
            .request_durations_ms
            .entry(endpoint.to_string())
            .or_default()
            .push(duration.as_millis() as u64);
        if status >= 400 {
            *inner.error_count.entry(endpoint.to_string()).or_default() += 1;
        }
    }

    pub fn record_cache_hit(&self, key: &str) {
        self.inner.write().expect("metrics lock").cache_hits += 1;
        tracing::debug!(cache_key = key, "cache hit");
    }

    pub fn record_cache_miss(&self, key: &str) {
        self.inner.write().expect("metrics lock").cache_misses += 1;
        tracing::debug!(cache_key = key, "cache miss");
    }

    pub fn record_queue_depth(&self, worker: &str, depth: i64) {
        self.inner
            .write()
            .expect("metrics lock")
            .queue_depths
            .insert(worker.to_string(), depth);
    }

    /// Aggregates served by the `/metrics` endpoint.
    pub fn snapshot(&self) -> Value {
        let inner = self.inner.read().expect("metrics lock");
        json!({
            "cache": {
                "hits": inner.cache_hits,
                "misses": inner.cache_misses,
                "hit_rate": inner.hit_rate_percent(),
            },
            "requests": inner.request_count,
            "errors": inner.error_count,
            "queue_depths": inner.queue_depths,
        })
    }

    /// Log a summary of totals plus per-endpoint latency aggregates.
    pub fn report(&self) {
        let inner = self.inner.read().expect("metrics lock");
        let total_requests: u64 = inner.request_count.values().sum();
        let total_errors: u64 = inner.error_count.values().sum();
        tracing::info!(
            total_requests,
            total_errors,
            cache_hits = inner.cache_hits,
            cache_misses = inner.cache_misses,
            cache_hit_rate_percent = inner.hit_rate_percent(),
            "metrics report"
        );
        for (endpoint, durations) in &inner.request_durations_ms {
            if durations.is_empty() {
                continue;
            }
            let avg = durations.iter().sum::<u64>() as f64 / durations.len() as f64;
            tracing::info!(
                endpoint,
                request_count = inner.request_count.get(endpoint).copied().unwrap_or(0),
                error_count = inner.error_count.get(endpoint).copied().unwrap_or(0),
                avg_duration_ms = avg,
                p95_duration_ms = percentile(durations, 0.95),
                "endpoint performance"
            );
        }
    }
}

fn percentile(values: &[u64], percentile: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let index = (percentile * (sorted.len() - 1) as f64) as usize;
    sorted[index]
}

/// Spawn the periodic log reporter; stops when the process-lifetime token is
/// cancelled.
pub fn spawn_reporter(metrics: Arc<Metrics>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REPORT_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => metrics.report(),
            }
        }
    });
}
