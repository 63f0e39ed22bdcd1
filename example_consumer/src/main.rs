//! Demo server: mounts `/story/...` and `/db/...` on one PostgreSQL pool.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Try: `curl -H 'Content-Type: application/json' -d '{"sql":"select * from tbl"}' localhost:8888/db/query`

use std::sync::Arc;

use switchboard::{
    common_routes, handler_routes, AppState, Database, DbHandler, Settings, StoryHandler,
};
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("switchboard=info")),
        )
        .init();

    let settings = Arc::new(Settings::from_env()?);
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/switchboard".into());
    let db = Database::connect(&database_url, &settings).await?;
    db.ensure_demo_table().await?;

    let app = common_routes(AppState {
        db: db.clone(),
        settings: Arc::clone(&settings),
    })
    .merge(handler_routes("story", StoryHandler::new(db.clone()), Arc::clone(&settings)))
    .merge(handler_routes("db", DbHandler::new(db), Arc::clone(&settings)))
    .layer(RequestBodyLimitLayer::new(settings.body_limit));

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8888".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(debug = settings.debug, "listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
