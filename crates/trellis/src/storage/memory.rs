//! In-memory storage implementation.
//!
//! This backend keeps everything in HashMaps behind shared locks. Each
//! instance is isolated, which makes it the default backend for tests and for
//! the server's demo mode.

use crate::domain::{filter_issues, Dataset, Issue, IssueFilter, Project};
use crate::storage::{IssueStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// In-memory storage backend using HashMaps.
///
/// All data is lost when the last clone is dropped.
/// Uses `Arc<RwLock<>>` for shared interior mutability - clones share the same data.
///
/// # Examples
///
/// ```
/// use trellis::domain::{Issue, IssueType, Project};
/// use trellis::storage::InMemoryStorage;
///
/// let storage = InMemoryStorage::new();
/// storage.save_project(Project::new("proj-1", "POW", "Demo Project"));
/// storage.save_issue(Issue::new("POW-1", IssueType::Epic, "Auth").with_project("proj-1"));
///
/// assert_eq!(storage.issue_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    issues: Arc<RwLock<HashMap<String, Issue>>>,
    projects: Arc<RwLock<HashMap<String, Project>>>,
}

impl InMemoryStorage {
    /// Create an empty in-memory storage instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage instance pre-populated with `dataset`.
    pub fn from_dataset(dataset: Dataset) -> Self {
        let storage = Self::new();
        storage.import(dataset);
        storage
    }

    /// Insert or replace an issue.
    pub fn save_issue(&self, issue: Issue) {
        self.issues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(issue.id.clone(), issue);
    }

    /// Insert or replace a project.
    pub fn save_project(&self, project: Project) {
        self.projects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(project.id.clone(), project);
    }

    /// Remove an issue, returning it if it existed.
    pub fn remove_issue(&self, id: &str) -> Option<Issue> {
        self.issues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn import(&self, dataset: Dataset) {
        for project in dataset.projects {
            self.save_project(project);
        }
        for issue in dataset.issues {
            self.save_issue(issue);
        }
    }

    pub fn issue_count(&self) -> usize {
        self.issues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl IssueStore for InMemoryStorage {
    async fn get_issue_by_id(&self, id: &str) -> Result<Issue, StoreError> {
        self.issues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::issue_not_found(id))
    }

    async fn get_issue_by_key(&self, key: &str) -> Result<Issue, StoreError> {
        self.issues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|issue| issue.key == key)
            .cloned()
            .ok_or_else(|| StoreError::issue_not_found(key))
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>, StoreError> {
        let issues = self.issues.read().unwrap_or_else(PoisonError::into_inner);
        Ok(filter_issues(issues.values(), filter))
    }

    async fn get_project(&self, id: &str) -> Result<Project, StoreError> {
        self.projects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::project_not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueRef, IssueType};

    #[tokio::test]
    async fn test_save_and_load_issue() {
        let storage = InMemoryStorage::new();
        let issue = Issue::new("POW-1", IssueType::Task, "Test").with_id("issue-1");
        storage.save_issue(issue.clone());

        let loaded = storage.get_issue_by_id("issue-1").await.unwrap();
        assert_eq!(loaded, issue);
        let loaded = storage.get_issue_by_key("POW-1").await.unwrap();
        assert_eq!(loaded.id, "issue-1");
    }

    #[tokio::test]
    async fn test_save_updates_existing_issue() {
        let storage = InMemoryStorage::new();
        let mut issue = Issue::new("POW-1", IssueType::Task, "Original");
        storage.save_issue(issue.clone());

        issue.summary = "Updated".to_string();
        storage.save_issue(issue.clone());

        let loaded = storage.get_issue_by_id(&issue.id).await.unwrap();
        assert_eq!(loaded.summary, "Updated");
        assert_eq!(storage.issue_count(), 1);
    }

    #[tokio::test]
    async fn test_load_nonexistent_issue_fails() {
        let storage = InMemoryStorage::new();

        let result = storage.get_issue_by_key("POW-404").await;
        assert_eq!(result, Err(StoreError::issue_not_found("POW-404")));
    }

    #[tokio::test]
    async fn test_clones_share_data() {
        let storage = InMemoryStorage::new();
        let clone = storage.clone();
        clone.save_project(Project::new("proj-1", "POW", "Demo"));

        assert_eq!(storage.get_project("proj-1").await.unwrap().name, "Demo");
    }

    #[tokio::test]
    async fn test_removed_issue_disappears_from_listing() {
        let storage = InMemoryStorage::new();
        storage.save_issue(
            Issue::new("POW-2", IssueType::Story, "Child")
                .with_id("child")
                .with_epic(IssueRef::id("epic-1")),
        );
        let filter = IssueFilter {
            epic_id: Some("epic-1".to_string()),
            ..IssueFilter::default()
        };
        assert_eq!(storage.list_issues(&filter).await.unwrap().len(), 1);

        assert!(storage.remove_issue("child").is_some());
        assert!(storage.list_issues(&filter).await.unwrap().is_empty());
    }
}
