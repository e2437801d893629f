//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence; otherwise the configured log level applies.
//! Installing a subscriber twice is harmless: the second call reports
//! `false` and leaves the first one in place, which lets tests and embedding
//! services call this freely.

use tracing_subscriber::EnvFilter;

use crate::config::MonitoringConfig;

/// Install the global tracing subscriber
///
/// Returns `true` if this call installed it.
pub fn init_tracing(config: &MonitoringConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let installed = if config.json_logs {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::debug!(level = %config.log_level, json = config.json_logs, "Tracing initialized");
    }
    installed
}
