//! SQLite-based Storage Backend
//!
//! Namespaces are rows of the `namespaces` table and records are rows of
//! `records` keyed by `(namespace, key)`. Schema namespaces follow the same
//! layout; the `_schema` suffix is the only thing telling them apart.
//!
//! Uses connection pooling for concurrent access and transactions for
//! atomicity. Blocking driver calls run on the blocking thread pool.

use super::migrations;
use super::{check_names, Records, StorageBackend};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed storage backend
pub struct SqlStorageBackend {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SqlStorageBackend {
    /// Create a new SQL storage backend
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file
    /// * `pool_size` - Maximum number of pooled connections
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: u32) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(db_path)
            .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| StoreError::Database(format!("failed to create connection pool: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Run `f` on a pooled connection off the async executor
    async fn with_connection<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

fn namespace_exists(conn: &Connection, namespace: &str) -> StoreResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM namespaces WHERE name = ?",
            params![namespace],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn missing_record(conn: &Connection, namespace: &str, key: &str) -> StoreError {
    match namespace_exists(conn, namespace) {
        Ok(true) => StoreError::id_not_found(namespace, key),
        Ok(false) => StoreError::NamespaceNotFound(namespace.to_string()),
        Err(e) => e,
    }
}

#[async_trait]
impl StorageBackend for SqlStorageBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn init(&self) -> StoreResult<()> {
        self.with_connection(migrations::migrate).await
    }

    async fn disconnect(&self) {
        let state = self.pool.state();
        info!(
            connections = state.connections,
            idle = state.idle_connections,
            "closing sqlite connection pool"
        );
    }

    async fn upsert(&self, namespace: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        check_names(namespace, Some(key))?;
        let namespace = namespace.to_string();
        let key = key.to_string();
        let value = value.to_vec();

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;
            let now = current_timestamp();

            tx.execute(
                "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?, ?)",
                params![&namespace, now],
            )?;

            tx.execute(
                r#"
                INSERT INTO records (namespace, key, value, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(namespace, key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
                params![&namespace, &key, &value, now, now],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        check_names(namespace, Some(key))?;
        let namespace = namespace.to_string();
        let key = key.to_string();

        self.with_connection(move |conn| {
            let value: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT value FROM records WHERE namespace = ? AND key = ?",
                    params![&namespace, &key],
                    |row| row.get(0),
                )
                .optional()?;

            value.ok_or_else(|| missing_record(conn, &namespace, &key))
        })
        .await
    }

    async fn get_all(&self, namespace: &str) -> StoreResult<Records> {
        check_names(namespace, None)?;
        let namespace = namespace.to_string();

        self.with_connection(move |conn| {
            // One read transaction so the existence check and the rows agree
            let tx = conn.transaction()?;

            if !namespace_exists(&tx, &namespace)? {
                return Err(StoreError::NamespaceNotFound(namespace));
            }

            let records = {
                let mut stmt = tx.prepare("SELECT key, value FROM records WHERE namespace = ?")?;
                let rows = stmt.query_map(params![&namespace], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?;
                rows.collect::<Result<Records, _>>()?
            };

            tx.commit()?;
            Ok(records)
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StoreResult<()> {
        check_names(namespace, Some(key))?;
        let namespace = namespace.to_string();
        let key = key.to_string();

        self.with_connection(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM records WHERE namespace = ? AND key = ?",
                params![&namespace, &key],
            )?;

            if deleted == 0 {
                return Err(missing_record(conn, &namespace, &key));
            }
            Ok(())
        })
        .await
    }

    async fn delete_all(&self, namespace: &str) -> StoreResult<()> {
        check_names(namespace, None)?;
        let namespace = namespace.to_string();

        self.with_connection(move |conn| {
            let tx = conn.transaction()?;

            let removed = tx.execute("DELETE FROM namespaces WHERE name = ?", params![&namespace])?;
            if removed == 0 {
                return Err(StoreError::NamespaceNotFound(namespace));
            }
            tx.execute("DELETE FROM records WHERE namespace = ?", params![&namespace])?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_namespaces(&self) -> Vec<String> {
        let result = self
            .with_connection(|conn| {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await;

        result.unwrap_or_else(|e| {
            warn!("failed to list namespaces: {}", e);
            Vec::new()
        })
    }
}

/// Get current Unix timestamp in seconds
fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
