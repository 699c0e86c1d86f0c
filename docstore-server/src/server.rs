//! HTTP server implementation

use crate::api::build_router;
use crate::state::AppState;
use anyhow::Result;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Document store HTTP server
pub struct DocstoreServer {
    state: AppState,
    max_body_bytes: usize,
}

impl DocstoreServer {
    /// Create a new server
    pub fn new(state: AppState, max_body_bytes: usize) -> Self {
        Self {
            state,
            max_body_bytes,
        }
    }

    /// Serve on `listener` until `shutdown` resolves.
    ///
    /// On shutdown the broker is closed first so open change streams end
    /// and graceful shutdown does not wait on them. The backend is
    /// disconnected after the last request finishes.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let service = self.state.service.clone();
        let router = build_router(self.state, self.max_body_bytes);

        info!("HTTP server listening on {}", listener.local_addr()?);

        let broker = service.broker().cloned();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                info!("shutdown requested, closing change streams");
                if let Some(broker) = broker {
                    broker.close();
                }
            })
            .await?;

        service.shutdown().await;
        Ok(())
    }
}

/// Resolves on Ctrl-C
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
