//! HTTP surface of the document store

pub mod api;
pub mod error;
pub mod handlers;
pub mod server;
pub mod state;

pub use api::build_router;
pub use error::{ApiError, ErrorResponse};
pub use server::{shutdown_signal, DocstoreServer};
pub use state::AppState;
