// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kvlog_node::api::HealthResponse;
use kvlog_node::events::MemoryTransactionLogger;
use kvlog_node::server::build_router;
use kvlog_node::service::KvService;
use std::sync::Arc;
use tower::ServiceExt; // for oneshot

async fn app(auth: Option<&str>) -> (Router, Arc<KvService<MemoryTransactionLogger>>) {
    let svc = Arc::new(
        KvService::bootstrap(MemoryTransactionLogger::new())
            .await
            .unwrap(),
    );
    (build_router(Arc::clone(&svc), auth.map(String::from)), svc)
}

fn request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_put_get_delete_roundtrip() {
    let (app, svc) = app(None).await;

    let resp = app.clone().oneshot(request("PUT", "/v1/key/color", "blue")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app.clone().oneshot(request("GET", "/v1/key/color", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "blue");

    let resp = app.clone().oneshot(request("DELETE", "/v1/key/color", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.oneshot(request("GET", "/v1/key/color", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("color"));

    svc.shutdown().await.unwrap();
    assert_eq!(svc.logger().records().len(), 2);
}

#[tokio::test]
async fn test_reserved_characters_rejected() {
    let (app, svc) = app(None).await;

    let resp = app.oneshot(request("PUT", "/v1/key/k", "line\nbreak")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(svc.store().is_empty());
}

#[tokio::test]
async fn test_health_reports_sequence() {
    let (app, svc) = app(None).await;

    app.clone().oneshot(request("PUT", "/v1/key/a", "1")).await.unwrap();
    svc.shutdown().await.unwrap();

    let resp = app.oneshot(request("GET", "/v1/health", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.last_sequence, 1);
    assert_eq!(health.keys, 1);
}

#[tokio::test]
async fn test_auth_guard() {
    let (app, _svc) = app(Some("secret")).await;

    let resp = app.clone().oneshot(request("GET", "/v1/health", "")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .header("authorization", "Bearer secret")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
