//! Path dispatch: the second path segment names the handler method to run.
//!
//! `/{handler}/{method}/{rest...}`: the handler segment is only used in diagnostics,
//! the method segment is looked up in the handler's [`MethodTable`], and any later
//! segments are passed through as path arguments.

use crate::error::{AppError, DispatchError};
use crate::handler::Call;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub type MethodFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send>>;

/// A registered handler method. Register with `|h, call| Box::pin(h.name(call))`.
pub type MethodFn<H> = fn(Arc<H>, Call) -> MethodFuture;

/// Name -> method table for one handler type, built once at startup.
pub struct MethodTable<H> {
    methods: HashMap<&'static str, MethodFn<H>>,
}

impl<H> MethodTable<H> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    pub fn method(mut self, name: &'static str, method: MethodFn<H>) -> Self {
        if self.methods.insert(name, method).is_some() {
            tracing::warn!(method = name, "method registered twice; keeping the later one");
        }
        self
    }

    /// Exact-name lookup.
    pub fn resolve(&self, name: &str) -> Option<MethodFn<H>> {
        self.methods.get(name).copied()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl<H> Default for MethodTable<H> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRoute {
    pub handler: String,
    pub method: String,
    pub rest: Vec<String>,
}

pub fn parse_path(path: &str) -> PathRoute {
    let mut segments = path.split('/').skip(1);
    let handler = segments.next().unwrap_or_default().to_string();
    let method = segments.next().unwrap_or_default().to_string();
    let rest = segments
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    PathRoute {
        handler,
        method,
        rest,
    }
}

/// Resolve `route.method` and run it to completion, bounded by `timeout`.
pub async fn dispatch<H>(
    handler: &Arc<H>,
    table: &MethodTable<H>,
    route: &PathRoute,
    call: Call,
    timeout: Duration,
) -> Result<(), DispatchError> {
    let method = table
        .resolve(&route.method)
        .ok_or_else(|| DispatchError::RouteMissing {
            handler: route.handler.clone(),
            method: route.method.clone(),
        })?;
    tracing::debug!(handler = %route.handler, method = %route.method, "method running");
    match tokio::time::timeout(timeout, method(Arc::clone(handler), call)).await {
        Ok(result) => result.map_err(DispatchError::MethodFault),
        Err(_) => Err(DispatchError::MethodFault(AppError::Timeout {
            operation: "method",
            millis: timeout.as_millis(),
        })),
    }
}
