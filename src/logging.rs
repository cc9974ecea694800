//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured level so operators can turn
//! on debug output for a single module without editing the config file.

use crate::config::{LogConfig, LogFormat};
use crate::error::{AppResult, SyncError};
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// # Errors
///
/// Fails if the configured level is not a valid filter directive or a global
/// subscriber has already been installed.
pub fn init(config: &LogConfig) -> AppResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| SyncError::Logging(format!("invalid level '{}': {e}", config.level)))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    result.map_err(|e| SyncError::Logging(e.to_string()))
}
