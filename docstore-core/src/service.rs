//! Document Service
//!
//! Coordinates the storage backend, the validation gate and the change
//! broker to provide the document store operations.
//!
//! # Control flow
//!
//! ```text
//! write:  identifiers -> schema gate -> [auth wrap] -> backend -> publish
//! read:   identifiers -> backend
//! search: identifiers -> backend snapshot -> decode -> filter
//! ```
//!
//! Events are published only after the backend reports success. A broker
//! failure never fails the mutation that triggered it.

use crate::broker::{Broker, ChangeEvent, Subscription};
use crate::error::{StoreError, StoreResult};
use crate::metrics;
use crate::namespace::{is_schema_namespace, schema_namespace, validate_identifier, SCHEMA_KEY};
use crate::payload::Payload;
use crate::search::{run_filter, JqFilter, SearchFilter, SearchHit};
use crate::storage::StorageBackend;
use crate::validation::{compile_schema, validate_document};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Document store operations over one backend
pub struct DocumentService {
    /// Storage medium
    store: Arc<dyn StorageBackend>,

    /// Change broker, absent when notifications are disabled
    broker: Option<Broker>,

    /// Wrap stored documents with the acting user
    auth_enabled: bool,
}

impl DocumentService {
    /// Create a new document service
    ///
    /// # Arguments
    ///
    /// * `store` - Initialized storage backend
    /// * `broker` - Change broker, or `None` to disable notifications
    /// * `auth_enabled` - Store `{"user", "data"}` wrappers instead of bare documents
    pub fn new(store: Arc<dyn StorageBackend>, broker: Option<Broker>, auth_enabled: bool) -> Self {
        info!(
            backend = store.name(),
            broker = broker.is_some(),
            auth = auth_enabled,
            "creating document service"
        );

        Self {
            store,
            broker,
            auth_enabled,
        }
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.store
    }

    pub fn broker(&self) -> Option<&Broker> {
        self.broker.as_ref()
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_enabled
    }

    /// Data namespaces, sorted. Schema namespaces are not listed.
    pub async fn list_namespaces(&self) -> Vec<String> {
        self.store
            .get_namespaces()
            .await
            .into_iter()
            .filter(|ns| !is_schema_namespace(ns))
            .collect()
    }

    /// Every record of `namespace`, decoded.
    ///
    /// One undecodable record fails the whole read.
    pub async fn get_namespace(&self, namespace: &str) -> StoreResult<BTreeMap<String, Value>> {
        validate_identifier(namespace)?;
        Ok(self.snapshot(namespace).await?.into_iter().collect())
    }

    /// Remove `namespace` and all of its records.
    ///
    /// The namespace's schema, if any, is kept.
    pub async fn delete_namespace(&self, user: Option<&str>, namespace: &str) -> StoreResult<()> {
        validate_identifier(namespace)?;
        self.store.delete_all(namespace).await?;

        info!(namespace, "namespace deleted");
        self.notify(ChangeEvent::namespace_deleted(
            user.map(str::to_string),
            namespace,
        ));
        Ok(())
    }

    /// Validate `body` and store it under `key`.
    ///
    /// Returns the bytes actually stored, which differ from `body` when
    /// authentication wrapping is on.
    pub async fn upsert(
        &self,
        user: Option<&str>,
        namespace: &str,
        key: &str,
        body: &[u8],
    ) -> StoreResult<Vec<u8>> {
        validate_identifier(namespace)?;
        validate_identifier(key)?;

        let schema = self.load_schema(namespace).await?;
        let value = validate_document(schema.as_deref(), body).map_err(|e| {
            if matches!(e, StoreError::Validation(_)) {
                metrics::record_validation_failure();
            }
            e
        })?;

        let stored = if self.auth_enabled {
            let user = user.ok_or_else(|| {
                StoreError::Validation(vec![
                    "authentication is enabled but no acting user was supplied".to_string(),
                ])
            })?;
            Payload::new(user, value.clone()).wrap()?
        } else {
            body.to_vec()
        };

        self.store.upsert(namespace, key, &stored).await?;

        debug!(namespace, key, bytes = stored.len(), "document stored");
        self.notify(ChangeEvent::item_added(
            user.map(str::to_string),
            namespace,
            key,
            value,
        ));
        Ok(stored)
    }

    /// Raw stored bytes of one record
    pub async fn get(&self, namespace: &str, key: &str) -> StoreResult<Vec<u8>> {
        validate_identifier(namespace)?;
        validate_identifier(key)?;
        self.store.get(namespace, key).await
    }

    /// Remove one record
    pub async fn delete(&self, user: Option<&str>, namespace: &str, key: &str) -> StoreResult<()> {
        validate_identifier(namespace)?;
        validate_identifier(key)?;
        self.store.delete(namespace, key).await?;

        debug!(namespace, key, "document deleted");
        self.notify(ChangeEvent::item_deleted(
            user.map(str::to_string),
            namespace,
            key,
        ));
        Ok(())
    }

    /// Register the JSON schema future writes to `namespace` must satisfy.
    ///
    /// The schema must compile; the namespace itself need not exist yet.
    pub async fn put_schema(&self, namespace: &str, schema: &[u8]) -> StoreResult<Vec<u8>> {
        validate_identifier(namespace)?;
        compile_schema(schema)?;

        self.store
            .upsert(&schema_namespace(namespace), SCHEMA_KEY, schema)
            .await?;

        info!(namespace, "schema registered");
        Ok(schema.to_vec())
    }

    /// The schema registered for `namespace`
    pub async fn get_schema(&self, namespace: &str) -> StoreResult<Vec<u8>> {
        validate_identifier(namespace)?;
        self.store.get(&schema_namespace(namespace), SCHEMA_KEY).await
    }

    /// Stop enforcing a schema on `namespace`
    pub async fn delete_schema(&self, namespace: &str) -> StoreResult<()> {
        validate_identifier(namespace)?;
        self.store
            .delete(&schema_namespace(namespace), SCHEMA_KEY)
            .await?;

        info!(namespace, "schema removed");
        Ok(())
    }

    /// Run `filter` over every document of `namespace`
    pub async fn search(
        &self,
        namespace: &str,
        filter: &dyn SearchFilter,
    ) -> StoreResult<Vec<SearchHit>> {
        validate_identifier(namespace)?;
        let snapshot = self.snapshot(namespace).await?;
        run_filter(filter, snapshot)
    }

    /// Compile `program` as jq and search with it
    pub async fn search_program(
        &self,
        namespace: &str,
        program: &str,
    ) -> StoreResult<Vec<SearchHit>> {
        let filter = JqFilter::parse(program)?;
        self.search(namespace, &filter).await
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> StoreResult<Subscription> {
        match &self.broker {
            Some(broker) => broker.subscribe(),
            None => Err(StoreError::BrokerUnavailable(
                "change notifications are disabled".to_string(),
            )),
        }
    }

    /// Close the broker, then release the backend
    pub async fn shutdown(&self) {
        if let Some(broker) = &self.broker {
            broker.close();
        }
        self.store.disconnect().await;
        info!(backend = self.store.name(), "document service stopped");
    }

    /// Schema bytes for `namespace`, if one is registered.
    ///
    /// Only "not found" means "no schema"; any other backend fault refuses
    /// the write.
    async fn load_schema(&self, namespace: &str) -> StoreResult<Option<Vec<u8>>> {
        match self.store.get(&schema_namespace(namespace), SCHEMA_KEY).await {
            Ok(schema) => Ok(Some(schema)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn snapshot(&self, namespace: &str) -> StoreResult<Vec<(String, Value)>> {
        let records = self.store.get_all(namespace).await?;

        records
            .into_iter()
            .map(|(key, bytes)| match serde_json::from_slice(&bytes) {
                Ok(value) => Ok((key, value)),
                Err(e) => Err(StoreError::Decode {
                    namespace: namespace.to_string(),
                    key,
                    reason: e.to_string(),
                }),
            })
            .collect()
    }

    fn notify(&self, event: ChangeEvent) {
        metrics::record_mutation(event.event.as_str());

        let Some(broker) = &self.broker else {
            return;
        };
        match broker.publish(event) {
            Ok(delivered) => debug!(delivered, "change event published"),
            Err(e) => warn!("change event dropped: {}", e),
        }
    }
}
