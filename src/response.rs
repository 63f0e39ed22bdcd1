//! Response envelope and the per-request write slot.

use crate::error::{AppError, ErrorSpec, OK};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// Uniform body for JSON responses: `{code, message, data, debug}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub except: String,
    pub traceback: Vec<String>,
}

impl Envelope {
    pub fn ok(data: Option<Value>) -> Self {
        Self::from_spec(OK).with_data(data)
    }

    pub fn from_spec(spec: ErrorSpec) -> Self {
        Self {
            code: spec.code,
            message: spec.message.to_string(),
            data: None,
            debug: None,
        }
    }

    pub fn with_data(mut self, data: Option<Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_debug(mut self, debug: Option<DebugInfo>) -> Self {
        self.debug = debug;
        self
    }

    /// Plain-text rendering: the message, then the failure detail and trace when present.
    pub fn to_text(&self) -> String {
        match &self.debug {
            None => self.message.clone(),
            Some(debug) => {
                let mut out = format!("{}\n{}", self.message, debug.except);
                for line in &debug.traceback {
                    out.push('\n');
                    out.push_str(line);
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Json(Envelope),
    Html(String),
}

/// A committed response body with its status.
#[derive(Debug, Clone, PartialEq)]
pub struct Written {
    pub status: StatusCode,
    pub content: Content,
}

impl Written {
    pub fn json(status: StatusCode, envelope: Envelope) -> Self {
        Self {
            status,
            content: Content::Json(envelope),
        }
    }

    pub fn html(status: StatusCode, html: impl Into<String>) -> Self {
        Self {
            status,
            content: Content::Html(html.into()),
        }
    }

    /// JSON envelope when `is_json`, otherwise the envelope's text rendering.
    pub fn for_mode(is_json: bool, status: StatusCode, envelope: Envelope) -> Self {
        if is_json {
            Self::json(status, envelope)
        } else {
            let text = envelope.to_text();
            Self::html(status, text)
        }
    }
}

impl IntoResponse for Written {
    fn into_response(self) -> Response {
        match self.content {
            Content::Json(envelope) => (self.status, Json(envelope)).into_response(),
            Content::Html(html) => (self.status, Html(html)).into_response(),
        }
    }
}

/// Holds at most one committed response for a request. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct ResponseSlot(Arc<Mutex<SlotState>>);

#[derive(Debug, Default)]
struct SlotState {
    written: Option<Written>,
    finished: bool,
}

impl ResponseSlot {
    /// Commits the response. A second commit is rejected and the first one stands.
    pub fn commit(&self, written: Written) -> Result<(), AppError> {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.written.is_some() || state.finished {
            tracing::warn!(status = %written.status, "rejected second response write");
            return Err(AppError::AlreadyWritten);
        }
        state.written = Some(written);
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .written
            .is_some()
    }

    /// Turns the committed response into the HTTP response. Returns `None` if already finished;
    /// an uncommitted slot finishes as an empty 200.
    pub fn finish(&self) -> Option<Response> {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if state.finished {
            return None;
        }
        state.finished = true;
        Some(match state.written.take() {
            Some(written) => written.into_response(),
            None => StatusCode::OK.into_response(),
        })
    }
}
