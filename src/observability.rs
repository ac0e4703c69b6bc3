//! Tracing initialisation for the gateway.
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

static OBS_INIT: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber once. `RUST_LOG` wins over the
/// configured level so operators can widen filtering without a restart config
/// change. Safe to call repeatedly (tests share one process).
pub fn init_observability(log_level: &str) {
    let log_level = log_level.to_string();
    OBS_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    });
}
