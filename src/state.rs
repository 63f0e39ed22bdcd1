//! Shared state for routes. Everything here is read-only after startup.

use crate::config::Settings;
use crate::db::Database;
use crate::dispatch::MethodTable;
use crate::handler::Handler;
use std::sync::Arc;

/// State behind every route of one mounted handler.
pub struct HandlerState<H> {
    pub handler: Arc<H>,
    /// Built once from [`Handler::methods`].
    pub methods: Arc<MethodTable<H>>,
    pub settings: Arc<Settings>,
}

impl<H: Handler> HandlerState<H> {
    pub fn new(handler: H, settings: Arc<Settings>) -> Self {
        Self {
            handler: Arc::new(handler),
            methods: Arc::new(H::methods()),
            settings,
        }
    }
}

impl<H> Clone for HandlerState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            methods: Arc::clone(&self.methods),
            settings: Arc::clone(&self.settings),
        }
    }
}

/// State for the common (health, readiness, version) routes.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Arc<Settings>,
}
