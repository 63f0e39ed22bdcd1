//! Switchboard: path-dispatched JSON/HTML handlers with a uniform response envelope.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod request;
pub mod response;
pub mod routes;
pub mod state;

pub use config::Settings;
pub use db::Database;
pub use dispatch::{MethodFn, MethodTable, PathRoute};
pub use error::{AppError, ConfigError, DispatchError, ErrorCatalog, ErrorSpec};
pub use handler::{Call, Handler};
pub use handlers::{DbHandler, StoryHandler};
pub use request::RequestContext;
pub use response::{DebugInfo, Envelope};
pub use routes::{common_routes, handler_fallback, handler_routes};
pub use state::{AppState, HandlerState};
