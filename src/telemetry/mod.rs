//! Logging setup for waypost
//!
//! Structured logging via `tracing`, with the level and output format
//! (json or pretty) taken from configuration. The `RUST_LOG` environment
//! variable overrides the configured level.

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Telemetry error types
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to install the subscriber
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Initialize the global tracing subscriber
///
/// Call once at startup, before any spans or events are emitted.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| TelemetryError::Init(e.to_string()))
}
