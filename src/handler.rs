//! Handler base: per-request lifecycle and the write API handed to handler methods.
//!
//! Lifecycle: received -> classified -> dispatching -> method running (or route failed)
//! -> responding -> finished. Every failure goes through [`write_failure`], and the
//! response slot is finished exactly once at the end of [`serve`].

use crate::config::Settings;
use crate::dispatch::{dispatch, MethodTable, PathRoute};
use crate::error::{error_chain, AppError, DispatchError};
use crate::request::{self, RequestContext};
use crate::response::{DebugInfo, Envelope, ResponseSlot, Written};
use crate::state::HandlerState;
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A handler type whose methods are reachable as `/{name}/{method}`.
#[async_trait]
pub trait Handler: Send + Sync + Sized + 'static {
    fn methods() -> MethodTable<Self>;

    /// Runs once per request, after its response has been finished.
    async fn on_finish(&self, ctx: &RequestContext) {
        tracing::debug!(handler = %ctx.route.handler, method = %ctx.route.method, "finished");
    }
}

/// What a handler method gets for one request: the classified request and the write API.
#[derive(Clone)]
pub struct Call {
    ctx: Arc<RequestContext>,
    slot: ResponseSlot,
    settings: Arc<Settings>,
}

impl Call {
    pub fn new(ctx: Arc<RequestContext>, slot: ResponseSlot, settings: Arc<Settings>) -> Self {
        Self {
            ctx,
            slot,
            settings,
        }
    }

    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn route(&self) -> &PathRoute {
        &self.ctx.route
    }

    /// Path segments after the method name.
    pub fn path_args(&self) -> &[String] {
        &self.ctx.route.rest
    }

    pub fn is_json_request(&self) -> bool {
        self.ctx.is_json
    }

    pub fn json_args(&self) -> Option<&Map<String, Value>> {
        self.ctx.json_args.as_ref()
    }

    pub fn json_arg(&self, name: &str) -> Result<&Value, AppError> {
        self.json_args()
            .and_then(|args| args.get(name))
            .ok_or_else(|| AppError::MissingArgument(name.to_string()))
    }

    pub fn query_args(&self) -> &HashMap<String, String> {
        &self.ctx.query_args
    }

    pub fn argument(&self, name: &str) -> Option<&str> {
        self.ctx.query_args.get(name).map(String::as_str)
    }

    /// `{code: 0, message: "ok", data, debug: null}` at 200.
    pub fn write_json<T: Serialize>(&self, data: T) -> Result<(), AppError> {
        self.write_json_with(data, StatusCode::OK)
    }

    pub fn write_json_with<T: Serialize>(&self, data: T, status: StatusCode) -> Result<(), AppError> {
        let data = serde_json::to_value(data)?;
        self.write_envelope(Envelope::ok(Some(data)), status)
    }

    pub fn write_envelope(&self, envelope: Envelope, status: StatusCode) -> Result<(), AppError> {
        self.slot.commit(Written::json(status, envelope))
    }

    pub fn write_html(&self, html: impl Into<String>, status: StatusCode) -> Result<(), AppError> {
        self.slot.commit(Written::html(status, html))
    }

    pub fn write_text(&self, text: impl Into<String>) -> Result<(), AppError> {
        self.write_html(text, StatusCode::OK)
    }

    /// Writes the envelope as JSON for JSON requests, as text otherwise.
    pub fn respond(&self, envelope: Envelope, status: StatusCode) -> Result<(), AppError> {
        self.slot
            .commit(Written::for_mode(self.ctx.is_json, status, envelope))
    }
}

/// Axum entry point for every path owned by a handler.
pub async fn serve<H: Handler>(State(state): State<HandlerState<H>>, request: Request) -> Response {
    let slot = ResponseSlot::default();
    let (ctx, classified) = request::classify(request, state.settings.body_limit).await;
    let ctx = Arc::new(ctx);
    let route = &ctx.route;
    tracing::debug!(handler = %route.handler, method = %route.method, is_json = ctx.is_json, "classified");

    let outcome = match classified {
        Ok(()) => {
            let call = Call::new(Arc::clone(&ctx), slot.clone(), Arc::clone(&state.settings));
            dispatch(
                &state.handler,
                &state.methods,
                route,
                call,
                state.settings.method_timeout,
            )
            .await
        }
        Err(err) => Err(DispatchError::MethodFault(err)),
    };

    if let Err(err) = outcome {
        write_failure(&slot, &state.settings, ctx.is_json, route, &err);
    }

    tracing::debug!(handler = %route.handler, method = %route.method, "responding");
    let response = slot
        .finish()
        .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response());
    state.handler.on_finish(&ctx).await;
    response
}

/// Convert a dispatch failure into the error response, unless a response is already committed.
pub fn write_failure(
    slot: &ResponseSlot,
    settings: &Settings,
    is_json: bool,
    route: &PathRoute,
    err: &DispatchError,
) {
    let spec = err.classify(&settings.catalog);
    match err {
        DispatchError::RouteMissing { .. } => {
            tracing::info!(handler = %route.handler, method = %route.method, "route missing")
        }
        DispatchError::MethodFault(fault) => {
            tracing::error!(handler = %route.handler, method = %route.method, error = %fault, "method failed")
        }
    }
    if slot.is_committed() {
        tracing::warn!(error = %err, "failure after response was written; keeping the written response");
        return;
    }
    let debug = settings.debug.then(|| debug_info(route, err));
    let envelope = Envelope::from_spec(spec).with_debug(debug);
    if slot
        .commit(Written::for_mode(is_json, spec.status, envelope))
        .is_err()
    {
        tracing::warn!(error = %err, "error response not written");
    }
}

fn debug_info(route: &PathRoute, err: &DispatchError) -> DebugInfo {
    let mut traceback = vec![format!("in {}.{}", route.handler, route.method)];
    traceback.extend(error_chain(err));
    DebugInfo {
        except: err.to_string(),
        traceback,
    }
}
