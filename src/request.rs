//! Request classification: JSON vs. non-JSON, eager JSON body parsing, query arguments.

use crate::dispatch::{parse_path, PathRoute};
use crate::error::AppError;
use axum::body::Bytes;
use axum::extract::{Query, Request};
use axum::http::{header, HeaderMap, Method, Uri};
use serde_json::{Map, Value};
use std::collections::HashMap;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-request state, created at classify time and dropped when the response finishes.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub is_json: bool,
    /// Parsed body, present only for JSON requests.
    pub json_args: Option<Map<String, Value>>,
    pub query_args: HashMap<String, String>,
    pub route: PathRoute,
}

pub fn is_json_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with(JSON_CONTENT_TYPE))
        .unwrap_or(false)
}

/// Parse a JSON request body into a mapping. Empty, malformed, or non-object bodies are errors.
pub fn parse_json_args(body: &[u8]) -> Result<Map<String, Value>, AppError> {
    match serde_json::from_slice::<Value>(body)? {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::NotAnObject),
    }
}

impl RequestContext {
    /// Context with the JSON flag, query arguments and route filled in, but no parsed body.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        let is_json = is_json_request(&headers);
        let query_args = Query::<HashMap<String, String>>::try_from_uri(&uri)
            .map(|q| q.0)
            .unwrap_or_default();
        let route = parse_path(uri.path());
        Self {
            method,
            uri,
            headers,
            body,
            is_json,
            json_args: None,
            query_args,
            route,
        }
    }
}

/// Read the body (up to `body_limit` bytes) and classify the request.
///
/// The context is always returned so the request can still be answered and finished
/// when classification fails.
pub async fn classify(request: Request, body_limit: usize) -> (RequestContext, Result<(), AppError>) {
    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, body_limit).await {
        Ok(body) => classify_parts(parts.method, parts.uri, parts.headers, body),
        Err(e) => (
            RequestContext::new(parts.method, parts.uri, parts.headers, Bytes::new()),
            Err(AppError::BadRequest(format!("failed to read body: {}", e))),
        ),
    }
}

pub fn classify_parts(
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (RequestContext, Result<(), AppError>) {
    let mut ctx = RequestContext::new(method, uri, headers, body);
    if !ctx.is_json {
        return (ctx, Ok(()));
    }
    let parsed = parse_json_args(&ctx.body).map(|args| ctx.json_args = Some(args));
    (ctx, parsed)
}
