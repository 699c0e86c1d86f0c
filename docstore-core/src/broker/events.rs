//! Change Events
//!
//! Immutable facts emitted once per successful mutation. They live only on
//! the notification stream and are never persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of mutation an event reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    ItemAdded,
    ItemDeleted,
    NamespaceDeleted,
}

impl EventKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ItemAdded => "ITEM_ADDED",
            EventKind::ItemDeleted => "ITEM_DELETED",
            EventKind::NamespaceDeleted => "NAMESPACE_DELETED",
        }
    }
}

/// Wire shape: `{event, user?, namespace, key?, value?}`
///
/// `key` is absent for namespace-level events and `value` is present only
/// for `ITEM_ADDED`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event: EventKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ChangeEvent {
    pub fn item_added(user: Option<String>, namespace: &str, key: &str, value: Value) -> Self {
        Self {
            event: EventKind::ItemAdded,
            user,
            namespace: namespace.to_string(),
            key: Some(key.to_string()),
            value: Some(value),
        }
    }

    pub fn item_deleted(user: Option<String>, namespace: &str, key: &str) -> Self {
        Self {
            event: EventKind::ItemDeleted,
            user,
            namespace: namespace.to_string(),
            key: Some(key.to_string()),
            value: None,
        }
    }

    pub fn namespace_deleted(user: Option<String>, namespace: &str) -> Self {
        Self {
            event: EventKind::NamespaceDeleted,
            user,
            namespace: namespace.to_string(),
            key: None,
            value: None,
        }
    }
}
