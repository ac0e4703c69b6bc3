//! Gateway binary: bootstrap, dependency wiring, and lifecycle.
use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tft_gateway::app::{AppState, ServiceStatuses, build_router};
use tft_gateway::bus::{MessageBus, NatsBus};
use tft_gateway::cache::CacheManager;
use tft_gateway::config::GatewayConfig;
use tft_gateway::enrich::NameEnricher;
use tft_gateway::kv::RedisKv;
use tft_gateway::metrics::{Metrics, spawn_reporter};
use tft_gateway::observability::init_observability;
use tft_gateway::ratelimit::{RateLimiter, RedisCounter};
use tft_gateway::riot::{RiotApi, RiotClient};
use tft_gateway::scheduler::spawn_scheduler;
use tft_gateway::store::NameStore;
use tft_gateway::store::postgres::PostgresNameStore;
use tft_gateway::workers::{WorkerContext, start_workers};
use tokio_util::sync::CancellationToken;

/// How long background workers get to finish after the server drains.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GatewayConfig::from_env().context("load configuration")?;
    init_observability(&config.log_level);
    let metrics = Arc::new(Metrics::new());

    // The counter store and the fast cache tier share one connection; the
    // manager multiplexes and reconnects internally.
    let redis_client =
        redis::Client::open(config.redis.url()).context("parse redis address")?;
    let redis_conn = redis_client
        .get_connection_manager()
        .await
        .context("connect to redis")?;
    tracing::info!(host = config.redis.host, "redis connected");

    // The durable name tier is optional: a missing or unreachable database
    // degrades name resolution, it does not stop the gateway.
    let names: Option<Arc<dyn NameStore>> = if config.database_enabled {
        match PostgresNameStore::connect(&config.postgres).await {
            Ok(store) => {
                tracing::info!(backend = store.backend_name(), "durable name store ready");
                Some(Arc::new(store))
            }
            Err(err) => {
                tracing::warn!(error = %err, "database unavailable, running without the durable name tier");
                None
            }
        }
    } else {
        tracing::info!("database disabled, running without the durable name tier");
        None
    };
    let postgres_status = match (&names, config.database_enabled) {
        (Some(_), _) => "connected",
        (None, true) => "unavailable",
        (None, false) => "disabled",
    };

    let cache = Arc::new(CacheManager::new(
        Arc::new(RedisKv::new(redis_conn.clone())),
        names,
        config.cache_enabled,
        config.riot_region.clone(),
        metrics.clone(),
    ));

    let limiter = Arc::new(RateLimiter::new(
        Arc::new(RedisCounter::new(redis_conn)),
        config.rate_limit_prefix.clone(),
        config.rate_limit_rules.clone(),
    ));

    // The bus is optional too: without it the gateway still serves, but
    // enrichment spillover, the workers, and the scheduler stay off.
    let bus: Option<Arc<dyn MessageBus>> =
        match NatsBus::connect(&config.nats_url, &config.nats_client_id).await {
            Ok(bus) => {
                tracing::info!(url = config.nats_url, "message bus connected");
                Some(Arc::new(bus))
            }
            Err(err) => {
                tracing::warn!(error = %err, "message bus unavailable, async enrichment disabled");
                None
            }
        };

    let enricher = NameEnricher::new(cache.clone(), bus.clone(), config.riot_region.clone());
    let riot = Arc::new(RiotClient::new(&config, cache.clone(), enricher)?);

    let shutdown = CancellationToken::new();
    let mut background = Vec::new();
    if let Some(bus) = &bus {
        let ctx = Arc::new(WorkerContext {
            riot: riot.clone() as Arc<dyn RiotApi>,
            cache: cache.clone(),
            region: config.riot_region.clone(),
        });
        let handles = start_workers(bus.clone(), ctx, shutdown.child_token())
            .await
            .context("start bus workers")?;
        background.extend(handles);
        spawn_scheduler(
            bus.clone(),
            config.riot_region.clone(),
            shutdown.child_token(),
        );
    }
    spawn_reporter(metrics.clone(), shutdown.child_token());

    let state = AppState {
        riot: riot as Arc<dyn RiotApi>,
        limiter,
        metrics,
        services: ServiceStatuses {
            redis: "connected".into(),
            postgres: postgres_status.into(),
            nats: if bus.is_some() {
                "connected".into()
            } else {
                "unavailable".into()
            },
        },
        home_region: config.riot_region.clone(),
    };
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.app_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, region = config.riot_region, "gateway listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    // The server drained; give workers a bounded window to finish in-flight
    // messages before exit.
    shutdown.cancel();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, futures::future::join_all(background)).await;
    tracing::info!("gateway exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
