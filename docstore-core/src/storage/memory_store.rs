//! In-Memory Storage Backend
//!
//! Volatile backend guarded by one global lock. Data is assumed small and
//! is lost when the process exits.

use super::{check_names, Records, StorageBackend};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage backend
pub struct MemoryStorageBackend {
    namespaces: Arc<RwLock<HashMap<String, Records>>>,
}

impl MemoryStorageBackend {
    /// Create an empty in-memory backend
    pub fn new() -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryStorageBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn init(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        check_names(namespace, Some(key))?;
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        check_names(namespace, Some(key))?;
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_string()))?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::id_not_found(namespace, key))
    }

    async fn get_all(&self, namespace: &str) -> StoreResult<Records> {
        check_names(namespace, None)?;
        let namespaces = self.namespaces.read().await;
        namespaces
            .get(namespace)
            .cloned()
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_string()))
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        check_names(namespace, Some(key))?;
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .get_mut(namespace)
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_string()))?
            .remove(key)
            .ok_or_else(|| StoreError::id_not_found(namespace, key))?;
        Ok(())
    }

    async fn delete_all(&self, namespace: &str) -> StoreResult<()> {
        check_names(namespace, None)?;
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .remove(namespace)
            .ok_or_else(|| StoreError::NamespaceNotFound(namespace.to_string()))?;
        Ok(())
    }

    async fn get_namespaces(&self) -> Vec<String> {
        let namespaces = self.namespaces.read().await;
        let mut names: Vec<String> = namespaces.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let backend = MemoryStorageBackend::new();

        backend.upsert("users", "1", br#"{"name":"jack"}"#).await.unwrap();
        let loaded = backend.get("users", "1").await.unwrap();

        assert_eq!(loaded, br#"{"name":"jack"}"#);
    }

    #[tokio::test]
    async fn test_memory_missing_namespace_vs_key() {
        let backend = MemoryStorageBackend::new();

        let result = backend.get("users", "1").await;
        assert!(matches!(result, Err(StoreError::NamespaceNotFound(_))));

        backend.upsert("users", "1", b"{}").await.unwrap();
        let result = backend.get("users", "2").await;
        assert!(matches!(result, Err(StoreError::IdNotFound { .. })));
    }

    #[tokio::test]
    async fn test_memory_namespace_survives_last_delete() {
        let backend = MemoryStorageBackend::new();

        backend.upsert("users", "1", b"{}").await.unwrap();
        backend.delete("users", "1").await.unwrap();

        assert!(backend.get_all("users").await.unwrap().is_empty());
        assert_eq!(backend.get_namespaces().await, vec!["users".to_string()]);
    }

    #[tokio::test]
    async fn test_memory_rejects_unsafe_names() {
        let backend = MemoryStorageBackend::new();
        let result = backend.upsert("../etc", "1", b"{}").await;
        assert!(matches!(result, Err(StoreError::InvalidIdentifier(_))));

        // Reads reject the same names instead of reporting them missing
        assert!(matches!(
            backend.get("a/b", "1").await,
            Err(StoreError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            backend.delete("users", "a b").await,
            Err(StoreError::InvalidIdentifier(_))
        ));
    }
}
