//! Logging setup for token-gate
//!
//! Installs the global `tracing` subscriber. Audit records are emitted on the
//! `token_gate::audit` target and go through the same subscriber.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Telemetry error types
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber is already installed
    #[error("Failed to initialize tracing: {0}")]
    Init(String),

    /// Unknown log output format
    #[error("Unsupported log format: {0}")]
    Format(String),
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self, TelemetryError> {
        match value.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(TelemetryError::Format(other.to_string())),
        }
    }
}

/// Map a configured level name to a `tracing` level
///
/// Unknown names fall back to `INFO`.
pub fn parse_level(log_level: &str) -> Level {
    match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize tracing subscriber with the configured level and format
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = LevelFilter::from_level(parse_level(&config.level));

    match LogFormat::parse(&config.format)? {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init(),
    }
    .map_err(|e| TelemetryError::Init(e.to_string()))
}
