//! Namespace and key naming rules, and the schema record convention.
//!
//! A namespace `users` may carry a JSON schema stored in the derived
//! namespace `users_schema` under the sentinel key [`SCHEMA_KEY`]. The
//! underscore keeps derived namespaces disjoint from caller-supplied names,
//! which are restricted to `[a-zA-Z0-9]+`.

use crate::error::{StoreError, StoreResult};

/// Suffix of the derived namespace holding a namespace's schema
pub const SCHEMA_SUFFIX: &str = "_schema";

/// Sentinel key of the schema record inside the derived namespace
pub const SCHEMA_KEY: &str = "_schema";

/// Check that a caller-supplied namespace or key is a non-empty
/// alphanumeric identifier.
pub fn validate_identifier(name: &str) -> StoreResult<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Name of the namespace holding the schema for `namespace`
pub fn schema_namespace(namespace: &str) -> String {
    format!("{}{}", namespace, SCHEMA_SUFFIX)
}

/// Whether `namespace` is a derived schema namespace
pub fn is_schema_namespace(namespace: &str) -> bool {
    namespace
        .strip_suffix(SCHEMA_SUFFIX)
        .map_or(false, |base| validate_identifier(base).is_ok())
}

/// Names a backend will accept: caller identifiers plus derived names.
///
/// Backends use this as a last line of defence against path traversal and
/// table-name injection; the service layer enforces the stricter rule.
pub(crate) fn is_storable_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
