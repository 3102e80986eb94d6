//! Tracing setup.
//!
//! `RUST_LOG` wins over the configured `log_level`. Production emits JSON
//! lines; everything else gets human-readable output.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::ClientConfig;

/// Builds the filter from `RUST_LOG`, falling back to `log_level`.
pub fn env_filter(config: &ClientConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &ClientConfig) -> Result<(), TryInitError> {
    let fmt_layer = if config.is_production() {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(fmt_layer)
        .try_init()?;

    tracing::debug!(environment = ?config.environment, "Tracing initialized");
    Ok(())
}
