//! Authenticated payload wrapper
//!
//! With authentication on, data namespaces store `{"user": .., "data": ..}`
//! instead of the bare document.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Acting user id, as forwarded by the token verifier
    pub user: String,

    /// The validated document
    pub data: Value,
}

impl Payload {
    pub fn new(user: impl Into<String>, data: Value) -> Self {
        Self {
            user: user.into(),
            data,
        }
    }

    /// Encode for storage
    pub fn wrap(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| StoreError::Encoding(format!("cannot encode payload: {}", e)))
    }

    /// Decode a stored wrapper
    pub fn unwrap_bytes(bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::Encoding(format!("not an authenticated payload: {}", e)))
    }
}
