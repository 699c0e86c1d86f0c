//! Filesystem Storage Backend
//!
//! One directory per namespace, one `<key>.json` file per record. A namespace
//! exists exactly when its directory exists.

use super::{check_names, Records, StorageBackend};
use crate::error::{StoreError, StoreResult};
use crate::namespace::is_storable_name;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of record files
const RECORD_EXTENSION: &str = "json";

/// Filesystem-backed storage
pub struct FileStorageBackend {
    /// Root directory holding one subdirectory per namespace
    root_dir: PathBuf,
}

impl FileStorageBackend {
    /// Create a filesystem backend rooted at `root_dir`.
    ///
    /// The directory is created by [`StorageBackend::init`].
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Root directory of this backend
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        self.root_dir.join(namespace)
    }

    fn record_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_path(namespace)
            .join(format!("{}.{}", key, RECORD_EXTENSION))
    }

    async fn namespace_exists(&self, namespace: &str) -> bool {
        tokio::fs::metadata(self.namespace_path(namespace))
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Map a "file not found" on a record to the right not-found flavour
    async fn missing_record(&self, namespace: &str, key: &str) -> StoreError {
        if self.namespace_exists(namespace).await {
            StoreError::id_not_found(namespace, key)
        } else {
            StoreError::NamespaceNotFound(namespace.to_string())
        }
    }
}

/// Extract the key from a record file name, ignoring temp files and strays
fn record_key(file_name: &str) -> Option<&str> {
    let (key, extension) = file_name.split_once('.')?;
    if extension == RECORD_EXTENSION && is_storable_name(key) {
        Some(key)
    } else {
        None
    }
}

#[async_trait]
impl StorageBackend for FileStorageBackend {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    async fn init(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root_dir).await.map_err(|e| {
            StoreError::Filesystem(format!(
                "failed to create storage directory {}: {}",
                self.root_dir.display(),
                e
            ))
        })
    }

    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        check_names(namespace, Some(key))?;

        tokio::fs::create_dir_all(self.namespace_path(namespace))
            .await
            .map_err(|e| StoreError::Filesystem(format!("failed to create namespace: {}", e)))?;

        // Write to temp file then atomic rename. The temp name is unique per
        // call so concurrent writers to one key never share a temp file.
        let path = self.record_path(namespace, key);
        let temp_path = self
            .namespace_path(namespace)
            .join(format!(".{}.{}.tmp", key, uuid::Uuid::new_v4().simple()));

        if let Err(e) = tokio::fs::write(&temp_path, value).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Filesystem(format!("write failed: {}", e)));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Filesystem(format!("atomic rename failed: {}", e)));
        }

        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        check_names(namespace, Some(key))?;

        match tokio::fs::read(self.record_path(namespace, key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(self.missing_record(namespace, key).await)
            }
            Err(e) => Err(StoreError::Filesystem(format!("read failed: {}", e))),
        }
    }

    async fn get_all(&self, namespace: &str) -> StoreResult<Records> {
        check_names(namespace, None)?;

        let mut entries = match tokio::fs::read_dir(self.namespace_path(namespace)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NamespaceNotFound(namespace.to_string()))
            }
            Err(e) => {
                return Err(StoreError::Filesystem(format!("failed to read namespace: {}", e)))
            }
        };

        let mut records = Records::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::Filesystem(format!("failed to read entry: {}", e)))?
        {
            let file_name = entry.file_name();
            let Some(key) = file_name.to_str().and_then(record_key) else {
                continue;
            };

            match tokio::fs::read(entry.path()).await {
                Ok(bytes) => {
                    records.insert(key.to_string(), bytes);
                }
                // Deleted between listing and reading
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(namespace, key, "record vanished during snapshot");
                }
                Err(e) => return Err(StoreError::Filesystem(format!("read failed: {}", e))),
            }
        }

        Ok(records)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        check_names(namespace, Some(key))?;

        match tokio::fs::remove_file(self.record_path(namespace, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(self.missing_record(namespace, key).await)
            }
            Err(e) => Err(StoreError::Filesystem(format!("delete failed: {}", e))),
        }
    }

    async fn delete_all(&self, namespace: &str) -> StoreResult<()> {
        check_names(namespace, None)?;

        match tokio::fs::remove_dir_all(self.namespace_path(namespace)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NamespaceNotFound(namespace.to_string()))
            }
            Err(e) => Err(StoreError::Filesystem(format!("failed to remove namespace: {}", e))),
        }
    }

    async fn get_namespaces(&self) -> Vec<String> {
        let mut names = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(root = %self.root_dir.display(), "failed to list namespaces: {}", e);
                return names;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
                    let file_name = entry.file_name();
                    match file_name.to_str() {
                        Some(name) if is_dir && is_storable_name(name) => {
                            names.push(name.to_string())
                        }
                        _ => {}
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("failed to read namespace entry: {}", e);
                    break;
                }
            }
        }

        names.sort();
        names
    }
}
