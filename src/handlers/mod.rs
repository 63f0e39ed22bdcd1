//! Concrete handlers built on the handler base.

pub mod query;
pub mod story;
pub use query::DbHandler;
pub use story::StoryHandler;
