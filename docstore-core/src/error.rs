//! Error types for document store operations

use thiserror::Error;

/// Result type for document store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Externally visible category of a failure.
///
/// The HTTP layer maps each class to one status code; the class must survive
/// the whole call chain so callers can tell "create this namespace" apart
/// from "retry later".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    BadRequest,
    Internal,
}

/// Errors that can occur in document store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key is absent from an existing namespace
    #[error("value not found in namespace '{namespace}' for key '{key}'")]
    IdNotFound { namespace: String, key: String },

    /// Namespace does not exist
    #[error("namespace '{0}' not found")]
    NamespaceNotFound(String),

    /// Filesystem backend failure
    #[error("filesystem error: {0}")]
    Filesystem(String),

    /// Relational backend or connection pool failure
    #[error("database error: {0}")]
    Database(String),

    /// A stored payload could not be decoded as JSON
    #[error("corrupted record '{key}' in namespace '{namespace}': {reason}")]
    Decode {
        namespace: String,
        key: String,
        reason: String,
    },

    /// A record could not be encoded for storage, or a stored wrapper
    /// could not be read back
    #[error("payload encoding error: {0}")]
    Encoding(String),

    /// The stored schema of a namespace no longer compiles
    #[error("stored schema is unusable: {0}")]
    StoredSchema(String),

    /// Candidate document rejected by the schema or by the JSON parser.
    /// Carries every violated rule.
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Namespace or key is not an alphanumeric identifier
    #[error("invalid identifier '{0}': only [a-zA-Z0-9] is allowed")]
    InvalidIdentifier(String),

    /// Search filter could not be parsed
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Search filter failed while evaluating a document
    #[error("filter evaluation failed: {0}")]
    FilterFailed(String),

    /// Notification path disabled or shut down
    #[error("broker unavailable: {0}")]
    BrokerUnavailable(String),
}

impl StoreError {
    /// Build an `IdNotFound` error
    pub fn id_not_found(namespace: &str, key: &str) -> Self {
        StoreError::IdNotFound {
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    /// Stable wire code for this error
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::IdNotFound { .. } => "ID_NOT_FOUND",
            StoreError::NamespaceNotFound(_) => "NAMESPACE_NOT_FOUND",
            StoreError::Filesystem(_) => "FILESYSTEM_ERROR",
            StoreError::Database(_) => "DATABASE_ERROR",
            StoreError::Decode { .. } => "DECODE_ERROR",
            StoreError::Encoding(_) => "ENCODING_ERROR",
            StoreError::StoredSchema(_) => "SCHEMA_CORRUPTED",
            StoreError::Validation(_) => "VALIDATION_FAILED",
            StoreError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            StoreError::InvalidFilter(_) => "INVALID_FILTER",
            StoreError::FilterFailed(_) => "FILTER_FAILED",
            StoreError::BrokerUnavailable(_) => "BROKER_UNAVAILABLE",
        }
    }

    /// Status category this error maps to
    pub fn class(&self) -> ErrorClass {
        match self {
            StoreError::IdNotFound { .. } => ErrorClass::NotFound,
            StoreError::NamespaceNotFound(_)
            | StoreError::Validation(_)
            | StoreError::InvalidIdentifier(_)
            | StoreError::InvalidFilter(_) => ErrorClass::BadRequest,
            StoreError::Filesystem(_)
            | StoreError::Database(_)
            | StoreError::Decode { .. }
            | StoreError::Encoding(_)
            | StoreError::StoredSchema(_)
            | StoreError::FilterFailed(_)
            | StoreError::BrokerUnavailable(_) => ErrorClass::Internal,
        }
    }

    /// True for either flavour of "not there"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::IdNotFound { .. } | StoreError::NamespaceNotFound(_)
        )
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(e: r2d2::Error) -> Self {
        StoreError::Database(format!("connection pool: {}", e))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::Database(format!("task join error: {}", e))
    }
}
