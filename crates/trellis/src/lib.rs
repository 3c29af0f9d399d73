//! Trellis issue hierarchy library
//!
//! Resolves breadcrumb trails and leveled hierarchy trees around a focus
//! issue against any [`IssueStore`] backend: local JSON files, memory, or the
//! REST issue API.

pub mod cli;
pub mod commands;
pub mod config;
pub mod demo;
pub mod domain;
pub mod errors;
pub mod hierarchy;
pub mod output;
pub mod resolution;
pub mod storage;
pub mod type_hierarchy;

// Re-export commonly used types
pub use commands::CommandExecutor;
pub use domain::{Issue, IssueRef, IssueType, Project};
pub use hierarchy::{Breadcrumb, HierarchyResolver, ResolveError, TreeNode};
pub use output::{ExitCode, JsonError, JsonOutput};
pub use resolution::{HierarchyView, Resolution, ResolutionSlot};
pub use storage::{HttpIssueStore, InMemoryStorage, IssueStore, JsonFileStorage, StoreError};
pub use type_hierarchy::HierarchySettings;
