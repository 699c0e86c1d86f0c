//! HTTP API tests
//!
//! The router is exercised in-process; no socket is opened.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use docstore_core::storage::MemoryStorageBackend;
use docstore_core::{Broker, DocumentService};
use docstore_server::{build_router, AppState, ErrorResponse};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app_with(broker: Option<Broker>, auth: bool, max_body_bytes: usize) -> Router {
    let service = Arc::new(DocumentService::new(
        Arc::new(MemoryStorageBackend::new()),
        broker,
        auth,
    ));
    let state = AppState::new(
        service,
        axum::http::HeaderName::from_static("x-user-id"),
        Duration::from_secs(15),
    );
    build_router(state, max_body_bytes)
}

fn app() -> Router {
    app_with(None, false, 1024 * 1024)
}

async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", "alice")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn as_json(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

fn error_code(bytes: &[u8]) -> String {
    serde_json::from_slice::<ErrorResponse>(bytes).unwrap().code
}

#[tokio::test]
async fn test_record_lifecycle() {
    let app = app();

    let (status, body) = send(&app, Method::POST, "/ns/users/1", r#"{"name":"jack","age":25}"#).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(as_json(&body), json!({"name": "jack", "age": 25}));

    let (status, _) = send(&app, Method::POST, "/ns/users/1", r#"{"name":"jack","age":26}"#).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/ns/users/1", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!({"name": "jack", "age": 26}));

    let (status, body) = send(&app, Method::DELETE, "/ns/users/1", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(as_json(&body), json!({}));

    let (status, body) = send(&app, Method::GET, "/ns/users/1", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "ID_NOT_FOUND");
}

#[tokio::test]
async fn test_error_statuses() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/ns/nobody/1", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "NAMESPACE_NOT_FOUND");

    let (status, body) = send(&app, Method::DELETE, "/ns/nobody", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "NAMESPACE_NOT_FOUND");

    let (status, body) = send(&app, Method::POST, "/ns/users/1", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_FAILED");

    let (status, body) = send(&app, Method::POST, "/ns/users_x/1", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_IDENTIFIER");

    let (status, _) = send(&app, Method::POST, "/ns/users", "{}").await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn test_namespace_routes() {
    let app = app();
    send(&app, Method::POST, "/ns/users/2", r#"{"n":2}"#).await;
    send(&app, Method::POST, "/ns/users/1", r#"{"n":1}"#).await;
    send(&app, Method::POST, "/ns/orders/1", r#"{}"#).await;

    let (status, body) = send(&app, Method::GET, "/ns", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!(["orders", "users"]));

    let (status, body) = send(&app, Method::GET, "/ns/users", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(as_json(&body), json!({"1": {"n": 1}, "2": {"n": 2}}));

    let (status, _) = send(&app, Method::DELETE, "/ns/users", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (_, body) = send(&app, Method::GET, "/ns", "").await;
    assert_eq!(as_json(&body), json!(["orders"]));
}

#[tokio::test]
async fn test_schema_routes() {
    let app = app();

    let (status, body) = send(&app, Method::GET, "/schema/users", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "NAMESPACE_NOT_FOUND");

    let schema = r#"{"type":"object","required":["name"]}"#;
    let (status, _) = send(&app, Method::POST, "/schema/users", schema).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, Method::GET, "/schema/users", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, schema.as_bytes());

    let (status, body) = send(&app, Method::POST, "/ns/users/1", r#"{"age":5}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_FAILED");

    let (status, _) = send(&app, Method::POST, "/ns/users/1", r#"{"name":"jack"}"#).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, Method::DELETE, "/schema/users", "").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = send(&app, Method::DELETE, "/schema/users", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, "/schema/users", r#"{"type": 7}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search() {
    let app = app();
    send(&app, Method::POST, "/ns/users/1", r#"{"name":"jack","age":25}"#).await;
    send(&app, Method::POST, "/ns/users/2", r#"{"name":"jill","age":12}"#).await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/search/users?filter=select(.age%20%3E%2018)%20%7C%20.name",
        "",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        as_json(&body),
        json!({"results": [{"key": "1", "value": "jack"}]})
    );

    let (status, body) = send(&app, Method::GET, "/search/users?filter=select(", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_FILTER");

    let (status, body) = send(&app, Method::GET, "/search/users?filter=.name.first", "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&body), "FILTER_FAILED");

    let (status, body) = send(&app, Method::GET, "/search/nobody?filter=.", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "NAMESPACE_NOT_FOUND");
}

#[tokio::test]
async fn test_auth_wrapping_uses_header() {
    let app = app_with(None, true, 1024);

    let (status, body) = send(&app, Method::POST, "/ns/notes/1", r#"{"text":"hi"}"#).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(as_json(&body), json!({"user": "alice", "data": {"text": "hi"}}));

    let (_, body) = send(&app, Method::GET, "/ns/notes/1", "").await;
    assert_eq!(as_json(&body), json!({"user": "alice", "data": {"text": "hi"}}));
}

#[tokio::test]
async fn test_body_limit() {
    let app = app_with(None, false, 64);
    let big = format!(r#"{{"pad":"{}"}}"#, "x".repeat(256));

    let (status, _) = send(&app, Method::POST, "/ns/users/1", &big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_cors_preflight() {
    let app = app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/ns/users/1")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let methods = response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
    assert!(methods.contains("DELETE"));

    // Simple requests carry the origin header too
    let request = Request::builder()
        .uri("/ns")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_broker_route_only_when_enabled() {
    let (status, _) = send(&app(), Method::GET, "/broker", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let broker = Broker::new(8);
    let app = app_with(Some(broker.clone()), false, 1024);
    let request = Request::builder()
        .uri("/broker")
        .body(Body::empty())
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(broker.subscriber_count(), 1);

    send(&app, Method::POST, "/ns/users/1", r#"{"name":"jack"}"#).await;
    broker.close();

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let data = text
        .lines()
        .find_map(|line| line.strip_prefix("data: "))
        .unwrap();
    assert_eq!(
        as_json(data.as_bytes()),
        json!({
            "event": "ITEM_ADDED",
            "user": "alice",
            "namespace": "users",
            "key": "1",
            "value": {"name": "jack"}
        })
    );
}

#[tokio::test]
async fn test_health() {
    let broker = Broker::new(8);
    let app = app_with(Some(broker), false, 1024);

    let (status, body) = send(&app, Method::GET, "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    let health = as_json(&body);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["backend"], "memory");
    assert_eq!(health["broker"], true);
}
