//! HTTP API handlers

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use docstore_core::SearchHit;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio_stream::{Stream, StreamExt};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub filter: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub broker: bool,
    pub subscribers: usize,
}

/// Stored bytes are JSON already; send them untouched
fn raw_json(status: StatusCode, body: Vec<u8>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        body,
    )
        .into_response()
}

fn accepted() -> Response {
    raw_json(StatusCode::ACCEPTED, b"{}".to_vec())
}

// ============================================================================
// Namespace Handlers
// ============================================================================

/// GET /ns - List namespaces
pub async fn list_namespaces(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.service.list_namespaces().await)
}

/// GET /ns/:ns - All records of a namespace
pub async fn get_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Json<BTreeMap<String, Value>>> {
    Ok(Json(state.service.get_namespace(&namespace).await?))
}

/// POST /ns/:ns - Not supported; records are written by key
pub async fn post_namespace() -> ApiError {
    ApiError::not_implemented("cannot POST to this endpoint!")
}

/// DELETE /ns/:ns - Remove a namespace and its records
pub async fn delete_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = state.acting_user(&headers);
    state
        .service
        .delete_namespace(user.as_deref(), &namespace)
        .await?;
    Ok(accepted())
}

// ============================================================================
// Record Handlers
// ============================================================================

/// GET /ns/:ns/:key - Stored record
pub async fn get_record(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
) -> ApiResult<Response> {
    let bytes = state.service.get(&namespace, &key).await?;
    Ok(raw_json(StatusCode::OK, bytes))
}

/// POST /ns/:ns/:key - Create or replace a record
pub async fn post_record(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let user = state.acting_user(&headers);
    let stored = state
        .service
        .upsert(user.as_deref(), &namespace, &key, &body)
        .await?;
    Ok(raw_json(StatusCode::CREATED, stored))
}

/// DELETE /ns/:ns/:key - Remove a record
pub async fn delete_record(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let user = state.acting_user(&headers);
    state
        .service
        .delete(user.as_deref(), &namespace, &key)
        .await?;
    Ok(accepted())
}

// ============================================================================
// Schema Handlers
// ============================================================================

/// GET /schema/:ns - Registered schema
pub async fn get_schema(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Response> {
    let schema = state
        .service
        .get_schema(&namespace)
        .await
        .map_err(ApiError::schema)?;
    Ok(raw_json(StatusCode::OK, schema))
}

/// POST /schema/:ns - Register a schema
pub async fn post_schema(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    body: Bytes,
) -> ApiResult<Response> {
    let schema = state
        .service
        .put_schema(&namespace, &body)
        .await
        .map_err(ApiError::schema)?;
    Ok(raw_json(StatusCode::CREATED, schema))
}

/// DELETE /schema/:ns - Remove a schema
pub async fn delete_schema(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> ApiResult<Response> {
    state
        .service
        .delete_schema(&namespace)
        .await
        .map_err(ApiError::schema)?;
    Ok(accepted())
}

// ============================================================================
// Search, Stream, Health
// ============================================================================

/// GET /search/:ns?filter=... - Run a filter over a namespace
pub async fn search(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<SearchResponse>> {
    let results = state
        .service
        .search_program(&namespace, &params.filter)
        .await?;
    Ok(Json(SearchResponse { results }))
}

/// GET /broker - Server-sent change events
///
/// The subscription ends when the client disconnects or the broker closes.
pub async fn change_stream(
    State(state): State<AppState>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, axum::Error>>>> {
    let subscription = state.service.subscribe()?;
    let events = subscription.map(|change| Event::default().json_data(&change));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let broker = state.service.broker();
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.service.store().name().to_string(),
        broker: broker.map_or(false, |b| !b.is_closed()),
        subscribers: broker.map_or(0, |b| b.subscriber_count()),
    })
}
