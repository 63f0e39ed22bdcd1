//! Failure catalog, typed errors, and HTTP mapping.

use crate::response::Envelope;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// One named failure class: envelope code, envelope message, HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorSpec {
    pub code: i64,
    pub message: &'static str,
    pub status: StatusCode,
}

pub const OK: ErrorSpec = ErrorSpec {
    code: 0,
    message: "ok",
    status: StatusCode::OK,
};

pub const ROUTE_MISSING: ErrorSpec = ErrorSpec {
    code: 400,
    message: "route missing for requested url, maybe mistyping or removed",
    status: StatusCode::NOT_FOUND,
};

pub const SYS: ErrorSpec = ErrorSpec {
    code: 500,
    message: "unknown server error",
    status: StatusCode::INTERNAL_SERVER_ERROR,
};

/// The failure classes known to the dispatcher. Built once and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCatalog {
    pub ok: ErrorSpec,
    pub route_missing: ErrorSpec,
    pub sys: ErrorSpec,
}

impl ErrorCatalog {
    pub const fn standard() -> Self {
        Self {
            ok: OK,
            route_missing: ROUTE_MISSING,
            sys: SYS,
        }
    }
}

impl Default for ErrorCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Faults raised while classifying a request or running a handler method.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("json body must be an object")]
    NotAnObject,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("missing argument: {0}")]
    MissingArgument(String),
    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: &'static str, millis: u128 },
    #[error("response already written")]
    AlreadyWritten,
    #[error("{0}")]
    Handler(String),
}

/// Outcome of resolving and running a handler method.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("no method '{method}' on handler '{handler}'")]
    RouteMissing { handler: String, method: String },
    #[error(transparent)]
    MethodFault(#[from] AppError),
}

impl DispatchError {
    /// Route-missing maps to its own class; every other failure is a system error.
    pub fn classify(&self, catalog: &ErrorCatalog) -> ErrorSpec {
        match self {
            DispatchError::RouteMissing { .. } => catalog.route_missing,
            DispatchError::MethodFault(_) => catalog.sys,
        }
    }
}

/// Display of an error followed by its `source` chain, outermost first.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        let line = format!("caused by: {}", cause);
        if lines.last().map(|l| !l.ends_with(&cause.to_string())).unwrap_or(true) {
            lines.push(line);
        }
        source = cause.source();
    }
    lines
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "request failed outside dispatch");
        (SYS.status, Json(Envelope::from_spec(SYS))).into_response()
    }
}
