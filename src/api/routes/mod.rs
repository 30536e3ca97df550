//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] — Job submission, progress streaming, results
//! - [`system`] — Health, capabilities, OpenAPI, shutdown

mod jobs;
mod system;

// Re-export all handlers so `routes::function_name` works, including the
// hidden utoipa path items the OpenAPI macro resolves.
pub use jobs::*;
pub use system::*;
