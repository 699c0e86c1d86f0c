//! Logging subsystem
//!
//! Everything logs through `tracing`. `RUST_LOG`, when set, takes
//! precedence over the configured level.

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Resolved subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub with_timestamp: bool,
    pub with_target: bool,
    pub json_format: bool,
}

impl LogConfig {
    /// Human-readable output at `level`, with timestamps and targets
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}

impl TryFrom<&LoggingConfig> for LogConfig {
    type Error = LoggingError;

    fn try_from(section: &LoggingConfig) -> Result<Self, Self::Error> {
        let level = LogLevel::parse(&section.level)
            .ok_or_else(|| LoggingError::InvalidLevel(section.level.clone()))?;

        Ok(Self {
            level,
            with_timestamp: section.with_timestamp,
            with_target: section.with_target,
            json_format: section.json_format,
        })
    }
}

/// Install the global subscriber. Fails if one is already installed.
///
/// # Example
/// ```
/// use docstore_core::logging::{init_logging_with_config, LogConfig, LogLevel};
///
/// init_logging_with_config(LogConfig::new(LogLevel::Debug)).unwrap();
/// ```
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    let layer = fmt::layer().with_target(config.with_target);
    let registry = tracing_subscriber::registry().with(filter);

    // Each formatter combination is a distinct layer type
    let installed = match (config.json_format, config.with_timestamp) {
        (true, true) => registry.with(layer.json()).try_init(),
        (true, false) => registry.with(layer.json().without_time()).try_init(),
        (false, true) => registry.with(layer).try_init(),
        (false, false) => registry.with(layer.without_time()).try_init(),
    };

    installed.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
