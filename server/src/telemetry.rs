//! Telemetry and observability setup.
//!
//! Provides structured logging with tracing.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

const DEFAULT_FILTER: &str = "info";

/// Initialize telemetry in the format picked by `LOG_FORMAT`.
pub fn init_with(format: LogFormat) {
    match format {
        LogFormat::Compact => init(),
        LogFormat::Json => init_json(),
    }
}

/// Initialize telemetry (tracing).
///
/// Log level can be set via RUST_LOG env var:
/// - RUST_LOG=debug (verbose, logs every push/pop/ack)
/// - RUST_LOG=info (default)
/// - RUST_LOG=warn (quiet, only dropped jobs)
/// - RUST_LOG=rqueue_server=debug (per-crate)
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Initialize telemetry with JSON output (for production/log aggregators).
pub fn init_json() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
