//! Structured logging setup.
//!
//! `RUST_LOG` wins over the configured level when set.

use crate::config::LoggingConfig;
use crate::error::{BankError, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber described by `config`.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_str().to_ascii_lowercase()))
        .map_err(|e| BankError::Config(format!("Invalid log filter: {e}")))?;

    if config.json_format {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| BankError::Config(format!("Logging already initialized: {e}")))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| BankError::Config(format!("Logging already initialized: {e}")))?;
    }

    info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}
