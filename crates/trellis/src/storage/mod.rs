//! Storage abstraction layer for reading issues and projects.
//!
//! This module defines the `IssueStore` trait the hierarchy resolver reads
//! through, allowing different backends (JSON files, in-memory, the REST API)
//! to be used interchangeably.

use crate::domain::{Issue, IssueFilter, IssueRef, Project};
use async_trait::async_trait;
use thiserror::Error;

pub mod http;
pub mod json;
pub mod memory;

pub use http::{HttpIssueStore, Session};
pub use json::JsonFileStorage;
pub use memory::InMemoryStorage;

/// Failures reported by an issue store.
///
/// The resolver treats every variant the same way for ancestors and
/// descendants; only the focus lookup distinguishes them, for exit codes.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("{kind} not found: {reference}")]
    NotFound {
        kind: &'static str,
        reference: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Storage I/O error: {0}")]
    Io(String),
}

impl StoreError {
    pub fn issue_not_found(reference: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "Issue",
            reference: reference.to_string(),
        }
    }

    pub fn project_not_found(reference: impl ToString) -> Self {
        StoreError::NotFound {
            kind: "Project",
            reference: reference.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Read access to issues and projects.
///
/// Implementations must be cheap to clone; clones share the same backing
/// data or connection pool.
///
/// # Examples
///
/// ```
/// use trellis::domain::{Issue, IssueFilter, IssueRef, IssueType};
/// use trellis::storage::{InMemoryStorage, IssueStore};
///
/// # #[tokio::main]
/// # async fn main() {
/// let storage = InMemoryStorage::new();
/// let story = Issue::new("POW-5", IssueType::Story, "Login form").with_id("issue-5");
/// storage.save_issue(story);
///
/// let loaded = storage.get_issue(&IssueRef::key("POW-5")).await.unwrap();
/// assert_eq!(loaded.id, "issue-5");
///
/// let none = storage.list_issues(&IssueFilter::children_of("issue-5")).await.unwrap();
/// assert!(none.is_empty());
/// # }
/// ```
#[async_trait]
pub trait IssueStore: Clone + Send + Sync {
    /// Load an issue by id.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when the id is unknown.
    async fn get_issue_by_id(&self, id: &str) -> Result<Issue, StoreError>;

    /// Load an issue by its human key.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when the key is unknown.
    async fn get_issue_by_key(&self, key: &str) -> Result<Issue, StoreError>;

    /// Load an issue through an explicit reference.
    async fn get_issue(&self, reference: &IssueRef) -> Result<Issue, StoreError> {
        match reference {
            IssueRef::Id(id) => self.get_issue_by_id(id).await,
            IssueRef::Key(key) => self.get_issue_by_key(key).await,
        }
    }

    /// List issues matching `filter`, in natural key order.
    ///
    /// No matches is an empty list, not an error.
    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>, StoreError>;

    /// Load a project by id.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` when the id is unknown.
    async fn get_project(&self, id: &str) -> Result<Project, StoreError>;
}
