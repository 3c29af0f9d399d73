//! Trellis REST API Server Library
//!
//! Serves issues, projects and resolved hierarchies over HTTP. The routes are
//! the ones `HttpIssueStore` reads from, so one trellis instance can act as
//! the issue store for another.

pub mod routes;

// Re-export for convenience
pub use routes::create_routes;
