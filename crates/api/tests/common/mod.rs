//! Shared helpers for the API integration tests.
//!
//! Every test app runs over in-memory backends and goes through the same
//! [`build_app_router`] the binary uses.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use relay_events::{EventBus, MemoryEventBus};
use relay_store::{ListStore, MemoryListStore};
use tower::ServiceExt;

use relay_api::config::ServerConfig;
use relay_api::router::build_app_router;
use relay_api::state::AppState;
use relay_api::ws::BridgeConfig;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        redis_url: None,
        bridge: BridgeConfig::default(),
    }
}

/// A router together with the backends behind it.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryListStore>,
    pub bus: Arc<MemoryEventBus>,
}

/// Build the full application over fresh in-memory backends.
pub fn build_test_app() -> TestApp {
    build_test_app_with_config(test_config())
}

pub fn build_test_app_with_config(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryListStore::new());
    let bus = Arc::new(MemoryEventBus::default());
    let (router, state) = build_router(config, store.clone(), bus.clone());
    TestApp {
        router,
        state,
        store,
        bus,
    }
}

/// Build the full application over caller-supplied backends.
pub fn build_router(
    config: ServerConfig,
    store: Arc<dyn ListStore>,
    bus: Arc<dyn EventBus>,
) -> (Router, AppState) {
    let state = AppState::new(config.clone(), store, bus);
    let router = build_app_router(state.clone(), &config);
    (router, state)
}

/// Serve `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Poll `check` until it holds or two seconds pass.
pub async fn wait_until<F, Fut>(check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    wait_until_within(Duration::from_secs(2), check).await;
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn wait_until_within<F, Fut>(timeout: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while !check().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, Body::empty(), None).await
}

pub async fn put(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::PUT, uri, Body::empty(), None).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    send(
        app,
        Method::POST,
        uri,
        Body::from(json.to_string()),
        Some("application/json"),
    )
    .await
}

/// POST a raw body with a JSON content type.
pub async fn post_raw(app: Router, uri: &str, body: &'static str) -> Response<Body> {
    send(app, Method::POST, uri, Body::from(body), Some("application/json")).await
}

async fn send(
    app: Router,
    method: Method,
    uri: &str,
    body: Body,
    content_type: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> axum::body::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Create a notification and return the created record as JSON.
pub async fn create(app: &Router, message: &str) -> serde_json::Value {
    let response = post_json(
        app.clone(),
        "/notifications",
        serde_json::json!({ "message": message }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}
