//! Integration tests for the health check endpoint and general HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get};
use tower::ServiceExt;

#[tokio::test]
async fn health_check_reports_memory_backend() {
    let (app, _) = common::build_test_app();
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["backend"], "memory");
    assert_eq!(json["store_healthy"], true);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let (app, _) = common::build_test_app();
    let response = get(app, "/this-route-does-not-exist").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let (app, _) = common::build_test_app();
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");

    // MakeRequestUuid produces hyphenated UUIDs.
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

#[tokio::test]
async fn cors_preflight_allows_dev_origin() {
    let (app, _) = common::build_test_app();

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/assets")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "PUT")
        .header("Access-Control-Request-Headers", "content-type")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:5173")
    );
}
