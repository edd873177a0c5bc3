//! Observability for the metering engine.
//!
//! - **Built-in metrics**: Counter, Gauge, Histogram grouped in [`MeterMetrics`]
//! - **Structured spans**: one span per start, tick, and grant with latency recorded on finish
//! - **Subscriber setup** (`server` feature): `fmt` output filtered through `RUST_LOG`

mod metrics;
mod spans;

pub use metrics::{Counter, Gauge, Histogram, MeterMetrics, MetricsSummary};
pub use spans::{MeterSpan, TracingConfig, TracingLevel};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false` if
/// tracing is disabled or a subscriber was already installed.
#[cfg(feature = "server")]
pub fn init_tracing(config: &TracingConfig) -> bool {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    if !config.enabled {
        return false;
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_filter()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
}
