//! Tracing subscriber setup.
//!
//! `log` records from the LLM client crate are bridged into the same
//! subscriber through `tracing-subscriber`'s `tracing-log` integration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Env var consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "RELAY_LOG";

/// Build the filter: `RELAY_LOG`, then `RUST_LOG`, then the configured level.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(fmt::layer().json().with_target(true).with_current_span(true))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_line_number(true)
                    .with_file(false),
            )
            .try_init()
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}
