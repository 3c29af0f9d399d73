//! Core domain types and operations for issue hierarchies.
//!
//! This module provides the domain layer containing:
//! - **types**: Core data structures (Issue, IssueType, IssueRef, Project, etc.)
//! - **queries**: Pure filtering and ordering on issue collections
//!
//! The domain layer is independent of storage and transport and can be used
//! directly for library integration.

pub mod queries;
pub mod types;

pub use queries::{filter_issues, sort_by_key, IssueFilter};
pub use types::*;
