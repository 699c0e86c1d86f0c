//! Configuration management for the document store
//!
//! Configuration comes from an optional TOML file, then environment
//! overrides, then validation.

use crate::logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

mod backend;
mod error;

pub use backend::{
    BackendConfig, ConnectionRequirement, FilesystemConfig, SqliteConfig, DEFAULT_POOL_SIZE,
    DEFAULT_ROOT_DIR, DEFAULT_SQLITE_PATH,
};
pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Storage backend selection
    pub storage: BackendConfig,

    /// Change broker configuration
    pub broker: BrokerConfig,

    /// Authentication payload wrapping
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Largest accepted request body
    pub max_body_bytes: usize,
}

/// Change broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Expose the change stream
    pub enabled: bool,

    /// Events buffered per subscriber before it is disconnected
    pub queue_capacity: usize,

    /// Interval of keep-alive comments on idle streams
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,
}

/// Authentication configuration
///
/// Token verification happens upstream; the verifier forwards the acting
/// user in `user_header`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Wrap stored documents as `{"user": .., "data": ..}`
    pub enabled: bool,

    /// Header carrying the acting user id
    pub user_header: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    pub enabled: bool,

    /// Exporter bind address
    pub bind_address: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            max_body_bytes: 1024 * 1024, // 1 MiB
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            queue_capacity: 256,
            keep_alive: Duration::from_secs(15),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            user_header: "x-user-id".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
        }
    }
}

/// Read and parse one `DOCSTORE_*` variable, if set
fn parse_env<T>(var: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(var) else {
        return Ok(None);
    };
    raw.parse().map(Some).map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        reason: e.to_string(),
    })
}

impl Config {
    /// Load configuration from environment variables on top of defaults
    ///
    /// Environment variables follow the pattern: DOCSTORE_<SECTION>_<KEY>
    /// Example: DOCSTORE_SERVER_BIND_ADDRESS=0.0.0.0:8000
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file, then apply environment overrides
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: Self = toml::from_str(&contents)?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DOCSTORE_*` environment overrides
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server config
        if let Some(addr) = parse_env("DOCSTORE_SERVER_BIND_ADDRESS")? {
            self.server.bind_address = addr;
        }
        if let Some(max) = parse_env("DOCSTORE_SERVER_MAX_BODY_BYTES")? {
            self.server.max_body_bytes = max;
        }

        // Storage config
        if let Ok(kind) = env::var("DOCSTORE_STORAGE_BACKEND") {
            self.storage = BackendConfig::from_kind(&kind).ok_or_else(|| ConfigError::Env {
                var: "DOCSTORE_STORAGE_BACKEND".to_string(),
                reason: format!("unknown backend '{}'", kind),
            })?;
        }
        if let Ok(path) = env::var("DOCSTORE_STORAGE_PATH") {
            self.storage.set_path(PathBuf::from(path));
        }

        // Broker config
        if let Some(enabled) = parse_env("DOCSTORE_BROKER_ENABLED")? {
            self.broker.enabled = enabled;
        }
        if let Some(capacity) = parse_env("DOCSTORE_BROKER_QUEUE_CAPACITY")? {
            self.broker.queue_capacity = capacity;
        }

        // Auth config
        if let Some(enabled) = parse_env("DOCSTORE_AUTH_ENABLED")? {
            self.auth.enabled = enabled;
        }
        if let Ok(header) = env::var("DOCSTORE_AUTH_USER_HEADER") {
            self.auth.user_header = header;
        }

        // Logging config
        if let Ok(level) = env::var("DOCSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = parse_env("DOCSTORE_LOG_JSON")? {
            self.logging.json_format = json;
        }

        // Metrics config
        if let Some(enabled) = parse_env("DOCSTORE_METRICS_ENABLED")? {
            self.metrics.enabled = enabled;
        }
        if let Some(addr) = parse_env("DOCSTORE_METRICS_BIND_ADDRESS")? {
            self.metrics.bind_address = addr;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "max_body_bytes must be greater than 0".to_string(),
            ));
        }

        if let BackendConfig::Sqlite(sql) = &self.storage {
            if sql.pool_size() == 0 {
                return Err(ConfigError::Invalid(
                    "sqlite pool_size must be greater than 0".to_string(),
                ));
            }
        }

        if self.broker.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broker queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.auth.enabled && self.auth.user_header.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "auth enabled but user_header is empty".to_string(),
            ));
        }

        if LogLevel::parse(&self.logging.level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}
