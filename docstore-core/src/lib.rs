//! Namespaced JSON document storage.
//!
//! Documents live under `(namespace, key)` in one of several storage
//! backends behind the [`StorageBackend`] contract. The [`DocumentService`]
//! validates writes against optional per-namespace schemas and publishes a
//! [`ChangeEvent`] to the [`Broker`] after every successful mutation.

pub mod broker;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod namespace;
pub mod payload;
pub mod search;
pub mod service;
pub mod storage;
pub mod validation;

pub use broker::{Broker, ChangeEvent, EventKind, Subscription};
pub use config::{BackendConfig, Config, ConnectionRequirement};
pub use error::{ErrorClass, StoreError, StoreResult};
pub use logging::{init_logging_with_config, LogConfig, LogLevel};
pub use payload::Payload;
pub use search::{JqFilter, SearchFilter, SearchHit};
pub use service::DocumentService;
pub use storage::{open_backend, Records, StorageBackend};
