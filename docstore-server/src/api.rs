//! API routes definition

use crate::handlers;
use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, http::Method, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

/// Any origin may read and write; preflights are answered by the layer
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
}

/// Build the API router with all endpoints
///
/// `/broker` is mounted only when the service has a broker.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let mut router = Router::new()
        // Namespace routes
        .route("/ns", get(handlers::list_namespaces))
        .route(
            "/ns/:ns",
            get(handlers::get_namespace)
                .post(handlers::post_namespace)
                .delete(handlers::delete_namespace),
        )
        // Record routes
        .route(
            "/ns/:ns/:key",
            get(handlers::get_record)
                .post(handlers::post_record)
                .delete(handlers::delete_record),
        )
        // Schema routes
        .route(
            "/schema/:ns",
            get(handlers::get_schema)
                .post(handlers::post_schema)
                .delete(handlers::delete_schema),
        )
        // Search
        .route("/search/:ns", get(handlers::search))
        .route("/health", get(handlers::health));

    if state.service.broker().is_some() {
        router = router.route("/broker", get(handlers::change_stream));
    }

    router
        .layer(cors_layer())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}
