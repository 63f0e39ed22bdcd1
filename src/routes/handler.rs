//! Mount a handler so every path under it goes through path dispatch, whatever the verb.

use crate::config::Settings;
use crate::handler::{serve, Handler};
use crate::state::HandlerState;
use axum::{routing::any, Router};
use std::sync::Arc;

/// `/{name}`, `/{name}/` and `/{name}/*` dispatched to `handler`. The wildcard never
/// matches an empty tail, so the trailing-slash form is registered on its own.
pub fn handler_routes<H: Handler>(name: &str, handler: H, settings: Arc<Settings>) -> Router {
    let state = HandlerState::new(handler, settings);
    tracing::debug!(handler = name, methods = ?state.methods.names(), "mounting handler");
    Router::new()
        .route(&format!("/{}", name), any(serve::<H>))
        .route(&format!("/{}/", name), any(serve::<H>))
        .route(&format!("/{}/*rest", name), any(serve::<H>))
        .with_state(state)
}

/// Any path not matched elsewhere is dispatched to `handler`.
pub fn handler_fallback<H: Handler>(handler: H, settings: Arc<Settings>) -> Router {
    let state = HandlerState::new(handler, settings);
    Router::new().fallback(serve::<H>).with_state(state)
}
