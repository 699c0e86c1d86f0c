//! Server state shared across requests

use axum::http::{HeaderMap, HeaderName};
use docstore_core::DocumentService;
use std::sync::Arc;
use std::time::Duration;

/// Server state shared across requests
#[derive(Clone)]
pub struct AppState {
    /// Document operations
    pub service: Arc<DocumentService>,

    /// Header carrying the acting user, set by the upstream token verifier
    pub user_header: HeaderName,

    /// Keep-alive interval of the change stream
    pub keep_alive: Duration,
}

impl AppState {
    /// Create a new server state
    pub fn new(service: Arc<DocumentService>, user_header: HeaderName, keep_alive: Duration) -> Self {
        Self {
            service,
            user_header,
            keep_alive,
        }
    }

    /// Acting user of a request, if the header is present and readable
    pub fn acting_user(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(&self.user_header)
            .and_then(|value| value.to_str().ok())
            .filter(|user| !user.is_empty())
            .map(str::to_string)
    }
}
