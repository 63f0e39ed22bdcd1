//! Router builders.

pub mod common;
pub mod handler;
pub use common::common_routes;
pub use handler::{handler_fallback, handler_routes};
