//! Storage Backend Contract
//!
//! Defines the uniform interface every storage medium implements over
//! `(namespace, key) -> bytes`, and the concrete implementations.

pub mod file_store;
pub mod memory_store;
pub mod migrations;
pub mod sql_store;

pub use file_store::FileStorageBackend;
pub use memory_store::MemoryStorageBackend;
pub use sql_store::SqlStorageBackend;

use crate::config::BackendConfig;
use crate::error::{StoreError, StoreResult};
use crate::namespace::is_storable_name;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Snapshot of a namespace: key -> raw payload
pub type Records = HashMap<String, Vec<u8>>;

/// Storage backend trait
///
/// Implementations must ensure:
/// - A write fully replaces the prior value or fails leaving it intact
/// - `IdNotFound` and `NamespaceNotFound` are reported distinctly
/// - Native driver errors are normalized into [`StoreError`]
///
/// Namespaces are created implicitly by `upsert` and live until
/// `delete_all`, even when their last key is deleted.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Short name of the medium, used in logs
    fn name(&self) -> &'static str;

    /// Prepare backend resources (directories, pools, tables).
    ///
    /// Failure here is a startup-time fatal error.
    async fn init(&self) -> StoreResult<()>;

    /// Release resources. Called once at shutdown.
    async fn disconnect(&self) {}

    /// Write `value` verbatim under `key`, creating the namespace if needed
    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Read one record
    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Snapshot every record of a namespace. No ordering guarantee.
    async fn get_all(&self, namespace: &str) -> StoreResult<Records>;

    /// Remove one record
    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()>;

    /// Remove a namespace and everything in it.
    ///
    /// Returns `NamespaceNotFound` when the namespace does not exist.
    async fn delete_all(&self, namespace: &str) -> StoreResult<()>;

    /// Names of all existing namespaces, sorted. Never fails.
    async fn get_namespaces(&self) -> Vec<String>;
}

/// Build the backend selected by configuration and run its `init`.
pub async fn open_backend(config: &BackendConfig) -> StoreResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config {
        BackendConfig::Memory => Arc::new(MemoryStorageBackend::new()),
        BackendConfig::Filesystem(fs) => Arc::new(FileStorageBackend::new(fs.root_dir())),
        BackendConfig::Sqlite(sql) => {
            Arc::new(SqlStorageBackend::new(sql.path(), sql.pool_size())?)
        }
    };

    backend.init().await?;
    tracing::info!(backend = backend.name(), "storage backend initialized");

    Ok(backend)
}

/// Reject names no backend should ever see.
pub(crate) fn check_names(namespace: &str, key: Option<&str>) -> StoreResult<()> {
    if !is_storable_name(namespace) {
        return Err(StoreError::InvalidIdentifier(namespace.to_string()));
    }
    match key {
        Some(key) if !is_storable_name(key) => Err(StoreError::InvalidIdentifier(key.to_string())),
        _ => Ok(()),
    }
}
