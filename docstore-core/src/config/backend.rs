//! Per-backend configuration and capability discovery

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default root directory of the filesystem backend
pub const DEFAULT_ROOT_DIR: &str = "./data";

/// Default database file of the SQLite backend
pub const DEFAULT_SQLITE_PATH: &str = "./docstore.db";

/// Default connection pool size of the SQLite backend
pub const DEFAULT_POOL_SIZE: u32 = 16;

/// What a backend needs from the operator before it can start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionRequirement {
    /// Nothing at all (volatile, in-process)
    Nothing,
    /// A local path on disk
    LocalPath,
    /// Remote connection parameters (host, user, password)
    Remote,
}

/// Storage backend selection. Unset fields take the documented defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Volatile in-memory storage
    Memory,
    /// One directory per namespace, one file per key
    Filesystem(FilesystemConfig),
    /// SQLite database file
    Sqlite(SqliteConfig),
}

/// Filesystem backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilesystemConfig {
    /// Root directory (default `./data`)
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
}

/// SQLite backend settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file (default `./docstore.db`)
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Connection pool size (default 16)
    #[serde(default)]
    pub pool_size: Option<u32>,
}

impl FilesystemConfig {
    pub fn root_dir(&self) -> PathBuf {
        self.root_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT_DIR))
    }
}

impl SqliteConfig {
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SQLITE_PATH))
    }

    pub fn pool_size(&self) -> u32 {
        self.pool_size.unwrap_or(DEFAULT_POOL_SIZE)
    }
}

impl BackendConfig {
    /// Parse a backend kind name (`memory`, `filesystem`/`fs`, `sqlite`)
    /// into a config with default settings.
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind.to_lowercase().as_str() {
            "memory" | "mem" => Some(BackendConfig::Memory),
            "filesystem" | "fs" => Some(BackendConfig::Filesystem(FilesystemConfig::default())),
            "sqlite" => Some(BackendConfig::Sqlite(SqliteConfig::default())),
            _ => None,
        }
    }

    /// Kind name as used in config files
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::Filesystem(_) => "filesystem",
            BackendConfig::Sqlite(_) => "sqlite",
        }
    }

    /// Capability discovery: what this backend needs to start
    pub fn requirement(&self) -> ConnectionRequirement {
        match self {
            BackendConfig::Memory => ConnectionRequirement::Nothing,
            BackendConfig::Filesystem(_) | BackendConfig::Sqlite(_) => {
                ConnectionRequirement::LocalPath
            }
        }
    }

    /// Point the backend at `path`, where the backend takes one
    pub fn set_path(&mut self, path: PathBuf) {
        match self {
            BackendConfig::Memory => {}
            BackendConfig::Filesystem(fs) => fs.root_dir = Some(path),
            BackendConfig::Sqlite(sql) => sql.path = Some(path),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Filesystem(FilesystemConfig::default())
    }
}
