use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use switchboard::{common_routes, AppState, Database, Settings};
use tower::ServiceExt;

fn app(debug: bool) -> Router {
    let settings = Arc::new(
        Settings::default()
            .with_debug(debug)
            .with_acquire_timeout(Duration::from_millis(300)),
    );
    let db = Database::connect_lazy("postgres://switchboard@127.0.0.1:1/none", &settings)
        .expect("lazy pool");
    common_routes(AppState { db, settings })
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).expect("request");
    let response = app.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn health_uses_the_envelope() {
    let (status, body) = get(&app(false), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"code": 0, "message": "ok", "data": {"status": "ok"}, "debug": null})
    );
}

#[tokio::test]
async fn version_names_the_crate() {
    let (status, body) = get(&app(false), "/version").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "switchboard");
}

#[tokio::test]
async fn ready_without_database_is_degraded_sys_envelope() {
    let (status, body) = get(&app(true), "/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 500);
    assert_eq!(body["message"], "unknown server error");
    assert_eq!(body["data"]["database"], "unavailable");
    assert!(!body["debug"]["except"].as_str().unwrap_or_default().is_empty());

    let (_, body) = get(&app(false), "/ready").await;
    assert!(body["debug"].is_null());
}
