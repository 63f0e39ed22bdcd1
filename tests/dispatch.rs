use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use switchboard::{
    handler_fallback, handler_routes, AppError, Call, Envelope, Handler, MethodTable, RequestContext,
    Settings,
};
use tower::ServiceExt;

struct Recorder {
    finished: Arc<AtomicUsize>,
}

impl Recorder {
    async fn echo(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.write_json(call.json_args())
    }

    async fn data(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.write_json(json!({"a": 1}))
    }

    async fn unauthorized(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.write_json_with(json!({"a": 1}), StatusCode::UNAUTHORIZED)
    }

    async fn silent(self: Arc<Self>, _call: Call) -> Result<(), AppError> {
        Ok(())
    }

    async fn twice(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.write_json(1)?;
        call.write_json(2)
    }

    async fn dbfault(self: Arc<Self>, _call: Call) -> Result<(), AppError> {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        Err(AppError::Db(sqlx::Error::Io(io)))
    }

    async fn slow(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        call.write_text("too late")
    }

    async fn args(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.write_json(json!({
            "path": call.path_args(),
            "q": call.argument("q"),
        }))
    }

    async fn mode(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.respond(Envelope::ok(Some(json!("x"))), StatusCode::ACCEPTED)
    }

    async fn page(self: Arc<Self>, call: Call) -> Result<(), AppError> {
        call.write_html("<b>hi</b>", StatusCode::OK)
    }
}

#[async_trait::async_trait]
impl Handler for Recorder {
    fn methods() -> MethodTable<Self> {
        MethodTable::<Self>::new()
            .method("echo", |h, call| Box::pin(h.echo(call)))
            .method("data", |h, call| Box::pin(h.data(call)))
            .method("unauthorized", |h, call| Box::pin(h.unauthorized(call)))
            .method("silent", |h, call| Box::pin(h.silent(call)))
            .method("twice", |h, call| Box::pin(h.twice(call)))
            .method("dbfault", |h, call| Box::pin(h.dbfault(call)))
            .method("slow", |h, call| Box::pin(h.slow(call)))
            .method("args", |h, call| Box::pin(h.args(call)))
            .method("mode", |h, call| Box::pin(h.mode(call)))
            .method("page", |h, call| Box::pin(h.page(call)))
    }

    async fn on_finish(&self, _ctx: &RequestContext) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

fn settings(debug: bool) -> Arc<Settings> {
    Arc::new(
        Settings::default()
            .with_debug(debug)
            .with_method_timeout(Duration::from_millis(100)),
    )
}

fn recorder() -> (Recorder, Arc<AtomicUsize>) {
    let finished = Arc::new(AtomicUsize::new(0));
    (
        Recorder {
            finished: Arc::clone(&finished),
        },
        finished,
    )
}

fn story_app(debug: bool) -> (Router, Arc<AtomicUsize>) {
    let (handler, finished) = recorder();
    (handler_routes("story", handler, settings(debug)), finished)
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: &str,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    let request = builder.body(Body::from(body.to_string())).expect("request");
    let response = router.clone().oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("response body");
    (status, String::from_utf8(bytes.to_vec()).expect("utf-8 body"))
}

async fn send_json(router: &Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let (status, text) = send(router, Method::POST, uri, Some("application/json"), body).await;
    let value = serde_json::from_str(&text)
        .unwrap_or_else(|e| panic!("response is not JSON: {e}; body={text}"));
    (status, value)
}

#[tokio::test]
async fn json_body_reaches_the_method_unchanged() {
    let (app, _) = story_app(false);
    let input = json!({"sql": "select 1", "nested": {"k": [1, 2, 3]}, "flag": true});
    let (status, body) = send_json(&app, "/story/echo", &input.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], input);
}

#[tokio::test]
async fn default_write_round_trips_the_envelope() {
    let (app, _) = story_app(false);
    let (status, body) = send_json(&app, "/story/data", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"code": 0, "message": "ok", "data": {"a": 1}, "debug": null})
    );
}

#[tokio::test]
async fn explicit_status_keeps_default_envelope() {
    let (app, _) = story_app(false);
    let (status, text) = send(&app, Method::GET, "/story/unauthorized", None, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&text).expect("json body");
    assert_eq!(
        body,
        json!({"code": 0, "message": "ok", "data": {"a": 1}, "debug": null})
    );
}

#[tokio::test]
async fn unknown_method_is_route_missing() {
    let (app, finished) = story_app(false);
    let (status, text) = send(&app, Method::GET, "/story/get2", None, "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(text.contains("route missing for requested url, maybe mistyping or removed"));

    let (status, body) = send_json(&app, "/story/get2", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 400);
    assert!(body["debug"].is_null());
    assert_eq!(finished.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn route_missing_regardless_of_handler_segment() {
    let (handler, _) = recorder();
    let app = handler_fallback(handler, settings(false));
    for uri in ["/story/get2", "/anything/get2", "/x/y/z", "/data", "/"] {
        let (status, body) = send_json(&app, uri, "{}").await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri {uri}");
        assert_eq!(body["code"], 400, "uri {uri}");
    }
    let (status, _) = send_json(&app, "/whatever/data", "{}").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn method_without_write_finishes_once_as_empty_ok() {
    let (app, finished) = story_app(false);
    let (status, text) = send(&app, Method::POST, "/story/silent", None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.is_empty());
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_write_is_rejected_and_first_response_stands() {
    let (app, finished) = story_app(true);
    let (status, body) = send_json(&app, "/story/twice", "{}").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], 1);
    assert!(body["debug"].is_null());
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn database_fault_becomes_sys_envelope_with_debug() {
    let (app, finished) = story_app(true);
    let (status, body) = send_json(&app, "/story/dbfault", "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert_eq!(body["message"], "unknown server error");
    let except = body["debug"]["except"].as_str().expect("except string");
    assert!(except.contains("connection refused"), "except: {except}");
    let traceback = body["debug"]["traceback"].as_array().expect("traceback array");
    assert!(!traceback.is_empty());
    assert!(traceback.iter().all(Value::is_string));
    assert_eq!(traceback[0], "in story.dbfault");
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn debug_detail_is_gated() {
    let (app, _) = story_app(false);
    let (status, body) = send_json(&app, "/story/dbfault", "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert!(body["debug"].is_null());

    let (_, text) = send(&app, Method::GET, "/story/dbfault", None, "").await;
    assert_eq!(text, "unknown server error");
}

#[tokio::test]
async fn non_json_failure_is_readable_text() {
    let (app, _) = story_app(true);
    let (status, text) = send(&app, Method::GET, "/story/dbfault", Some("text/html"), "").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(text.starts_with("unknown server error\n"));
    assert!(text.contains("connection refused"));
    assert!(text.contains("in story.dbfault"));
}

#[tokio::test]
async fn malformed_json_body_is_sys() {
    let (app, finished) = story_app(true);
    let (status, text) = send(&app, Method::POST, "/story/echo", Some("application/json"), "{oops").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_str(&text).expect("json body");
    assert_eq!(body["code"], 500);
    assert!(body["debug"]["except"].as_str().unwrap_or_default().starts_with("json:"));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_method_hits_the_deadline() {
    let (app, _) = story_app(true);
    let (status, body) = send_json(&app, "/story/slow", "{}").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert!(body["debug"]["except"]
        .as_str()
        .unwrap_or_default()
        .contains("timed out"));
}

#[tokio::test]
async fn path_and_query_arguments_reach_the_method() {
    let (app, _) = story_app(false);
    let (status, text) = send(&app, Method::GET, "/story/args/7/8?q=hello", None, "").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&text).expect("json body");
    assert_eq!(body["data"], json!({"path": ["7", "8"], "q": "hello"}));
}

#[tokio::test]
async fn html_write_and_bare_handler_path() {
    let (app, _) = story_app(false);
    let (status, text) = send(&app, Method::GET, "/story/page", None, "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "<b>hi</b>");

    let (status, _) = send(&app, Method::GET, "/story", None, "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn respond_picks_mode_from_the_request() {
    let (app, _) = story_app(false);
    let (status, body) = send_json(&app, "/story/mode", "{}").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"], "x");

    let (status, text) = send(&app, Method::GET, "/story/mode", None, "").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(text, "ok");
}

#[tokio::test]
async fn trailing_slash_without_method_is_route_missing() {
    let (app, finished) = story_app(false);
    let (status, body) = send_json(&app, "/story/", "{}").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 400);
    assert_eq!(
        body["message"],
        "route missing for requested url, maybe mistyping or removed"
    );
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn oversized_body_still_finishes_with_sys_envelope() {
    let (handler, finished) = recorder();
    let mut limited = Settings::default().with_debug(true);
    limited.body_limit = 8;
    let app = handler_routes("story", handler, Arc::new(limited));
    let (status, body) = send_json(&app, "/story/echo", r#"{"sql": "select 1"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 500);
    assert!(body["debug"]["except"]
        .as_str()
        .unwrap_or_default()
        .starts_with("bad request:"));
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}
