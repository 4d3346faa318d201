#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use rigforge_db::MemoryStore;
use rigforge_events::EventBus;
use tower::ServiceExt;

use rigforge_api::config::ServerConfig;
use rigforge_api::router::build_app_router;
use rigforge_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and a 30-second request timeout.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
        database_url: None,
        processing_timeout_secs: None,
        sweep_interval_secs: 30,
    }
}

/// Build the full application router over a fresh in-memory store.
///
/// Returns the state as well so tests can seed or inspect the store
/// directly.
pub fn build_test_app() -> (Router, AppState) {
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        Arc::new(EventBus::default()),
        test_config(),
    );
    let app = build_app_router(state.clone()).expect("test router should build");
    (app, state)
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty()).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, Body::empty()).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body.to_string())).await
}

pub async fn put_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::PUT, uri, Body::from(body.to_string())).await
}

async fn send(app: Router, method: Method, uri: &str, body: Body) -> Response<Body> {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// A generated, unrigged asset record as a client would PUT it.
pub fn asset_json(id: &str, placeholder: bool) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": id,
        "type": "character",
        "isPlaceholder": placeholder,
    })
}

/// A valid `succeed` body for `task_id`.
pub fn succeed_body(task_id: &str) -> serde_json::Value {
    serde_json::json!({
        "taskId": task_id,
        "rigType": "humanoid-standard",
        "characterHeight": 1.8,
        "animations": { "basic": { "walking": "w.anim" } },
        "riggedModelPath": "r.glb",
        "tposeModelPath": "t.glb",
    })
}
