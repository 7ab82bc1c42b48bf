//! Subscriber installation for `tracing`.

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::ConfigError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` when set, else the configured level.
///
/// # Errors
///
/// Returns `ConfigError::Logging` if the configured directive is malformed.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.level).map_err(|e| ConfigError::Logging(e.to_string()))
}

/// Installs the global subscriber.
///
/// Intended to be called once by the embedding binary. A second call fails
/// with `ConfigError::Logging` rather than panicking.
///
/// # Errors
///
/// Returns `ConfigError::Logging` if the filter is invalid or a global
/// subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    };

    result.map_err(|e| ConfigError::Logging(e.to_string()))
}
