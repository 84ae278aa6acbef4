//! Telemetry: log initialization and the in-process metrics registry
//!
//! Logging goes through the `tracing` ecosystem; metrics are plain
//! atomics exposed as the `/healthz` snapshot rather than an exporter.

pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};

/// Initialize the global tracing subscriber
///
/// `log_filter` is an `EnvFilter` directive (typically the `LOG_LEVEL`
/// option). Invalid directives fall back to `info`.
pub fn init(log_filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
