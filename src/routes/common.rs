//! Service routes answered with the switchboard envelope: `/health`, `/ready`, `/version`.

use crate::response::{DebugInfo, Envelope, Written};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde_json::json;

async fn health() -> Written {
    Written::json(StatusCode::OK, Envelope::ok(Some(json!({ "status": "ok" }))))
}

/// Round trip through the pool. A failed probe is a SYS envelope at 503.
async fn ready(State(state): State<AppState>) -> Written {
    match state.db.fetch_rows("SELECT 1").await {
        Ok(_) => Written::json(
            StatusCode::OK,
            Envelope::ok(Some(json!({ "status": "ok", "database": "ok" }))),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "readiness probe failed");
            let debug = state.settings.debug.then(|| DebugInfo {
                except: e.to_string(),
                traceback: vec!["in ready".to_string()],
            });
            let envelope = Envelope::from_spec(state.settings.catalog.sys)
                .with_data(Some(json!({ "status": "degraded", "database": "unavailable" })))
                .with_debug(debug);
            Written::json(StatusCode::SERVICE_UNAVAILABLE, envelope)
        }
    }
}

async fn version() -> Written {
    Written::json(
        StatusCode::OK,
        Envelope::ok(Some(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION")
        }))),
    )
}

pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/version", get(version))
        .with_state(state)
}
