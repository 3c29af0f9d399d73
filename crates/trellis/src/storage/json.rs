//! JSON file-based storage implementation.
//!
//! All data is stored as JSON files in a `data/` directory with atomic writes.

use crate::domain::{filter_issues, Dataset, DomainError, Issue, IssueFilter, Project};
use crate::storage::{IssueStore, StoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const ISSUES_DIR: &str = "data/issues";
const PROJECTS_DIR: &str = "data/projects";
const INDEX_FILE: &str = "data/index.json";

/// Index of all issues in the repository
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Index {
    /// Schema version for future migrations
    schema_version: u32,
    /// Issue key to issue id
    keys: BTreeMap<String, String>,
}

impl Default for Index {
    fn default() -> Self {
        Self {
            schema_version: 1,
            keys: BTreeMap::new(),
        }
    }
}

/// JSON file-based storage for issues and projects.
///
/// Each issue is stored as a separate file in `data/issues/`, each project in
/// `data/projects/`, and `data/index.json` maps keys to ids for key lookups.
/// All file writes are atomic (write to temp file, then rename).
#[derive(Clone)]
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    /// Create a new JSON file storage instance at the given root path
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Initialize the directory layout (idempotent).
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(ISSUES_DIR))
            .await
            .context("Failed to create issues directory")?;
        fs::create_dir_all(self.root.join(PROJECTS_DIR))
            .await
            .context("Failed to create projects directory")?;

        let index_path = self.root.join(INDEX_FILE);
        if !fs::try_exists(&index_path).await.unwrap_or(false) {
            self.write_json(&index_path, &Index::default()).await?;
        }

        Ok(())
    }

    /// Check that `init` has been run for this root.
    pub async fn validate(&self) -> Result<(), StoreError> {
        let index_path = self.root.join(INDEX_FILE);
        if !fs::try_exists(&index_path).await.unwrap_or(false) {
            return Err(StoreError::NotFound {
                kind: "Trellis data",
                reference: format!("{} (missing {})", self.root.display(), INDEX_FILE),
            });
        }
        Ok(())
    }

    /// Save an issue (create or update).
    pub async fn save_issue(&self, issue: &Issue) -> Result<()> {
        let mut index = self.load_index().await?;

        // A re-keyed issue must not leave its old key behind.
        index.keys.retain(|_, id| *id != issue.id);
        index.keys.insert(issue.key.clone(), issue.id.clone());

        let path = self.issue_path(&issue.id).ok_or_else(|| invalid_id("issue", &issue.id))?;
        self.write_json(&path, issue).await?;
        self.save_index(&index).await
    }

    /// Save a project (create or update).
    pub async fn save_project(&self, project: &Project) -> Result<()> {
        let path = self
            .project_path(&project.id)
            .ok_or_else(|| invalid_id("project", &project.id))?;
        self.write_json(&path, project).await
    }

    /// Import a dataset, returning how many issues were written.
    ///
    /// Ids are checked up front so a bad record aborts before anything is
    /// written.
    pub async fn import(&self, dataset: Dataset) -> Result<usize> {
        if let Some(project) = dataset.projects.iter().find(|p| record_file(&p.id).is_none()) {
            return Err(invalid_id("project", &project.id).into());
        }
        if let Some(issue) = dataset.issues.iter().find(|i| record_file(&i.id).is_none()) {
            return Err(invalid_id("issue", &issue.id).into());
        }

        for project in &dataset.projects {
            self.save_project(project)
                .await
                .with_context(|| format!("Failed to import project {}", project.id))?;
        }

        let mut index = self.load_index().await?;
        for issue in &dataset.issues {
            index.keys.retain(|_, id| *id != issue.id);
            index.keys.insert(issue.key.clone(), issue.id.clone());
            let path = self.issue_path(&issue.id).ok_or_else(|| invalid_id("issue", &issue.id))?;
            self.write_json(&path, issue)
                .await
                .with_context(|| format!("Failed to import issue {}", issue.key))?;
        }
        self.save_index(&index).await?;

        Ok(dataset.issues.len())
    }

    fn issue_path(&self, id: &str) -> Option<PathBuf> {
        record_file(id).map(|file| self.root.join(ISSUES_DIR).join(file))
    }

    fn project_path(&self, id: &str) -> Option<PathBuf> {
        record_file(id).map(|file| self.root.join(PROJECTS_DIR).join(file))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data).context("Failed to serialize data")?;

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, json)
            .await
            .context("Failed to write temporary file")?;
        fs::rename(&temp_path, path)
            .await
            .context("Failed to rename temporary file")?;

        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        path: &Path,
        not_found: impl FnOnce() -> StoreError,
    ) -> Result<T, StoreError> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => {
                return Err(StoreError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Decode(format!("{}: {}", path.display(), e)))
    }

    async fn load_index(&self) -> Result<Index> {
        Ok(self.read_index().await?)
    }

    async fn save_index(&self, index: &Index) -> Result<()> {
        let index_path = self.root.join(INDEX_FILE);
        self.write_json(&index_path, index).await
    }

    async fn read_index(&self) -> Result<Index, StoreError> {
        let index_path = self.root.join(INDEX_FILE);
        self.read_json(&index_path, || {
            StoreError::Io(format!("Missing {}; run `trellis init`", INDEX_FILE))
        })
        .await
    }
}

/// File name for a record id, or `None` when the id could resolve outside
/// its directory.
fn record_file(id: &str) -> Option<String> {
    let escapes = id.is_empty() || id.starts_with('.') || id.contains(['/', '\\', '\0']);
    (!escapes).then(|| format!("{}.json", id))
}

fn invalid_id(kind: &'static str, id: &str) -> DomainError {
    DomainError::InvalidId {
        kind,
        id: id.to_string(),
    }
}

#[async_trait]
impl IssueStore for JsonFileStorage {
    async fn get_issue_by_id(&self, id: &str) -> Result<Issue, StoreError> {
        let path = self
            .issue_path(id)
            .ok_or_else(|| StoreError::issue_not_found(id))?;
        self.read_json(&path, || StoreError::issue_not_found(id)).await
    }

    async fn get_issue_by_key(&self, key: &str) -> Result<Issue, StoreError> {
        let index = self.read_index().await?;
        let id = index
            .keys
            .get(key)
            .ok_or_else(|| StoreError::issue_not_found(key))?;
        let path = self
            .issue_path(id)
            .ok_or_else(|| StoreError::issue_not_found(key))?;
        self.read_json(&path, || StoreError::issue_not_found(key)).await
    }

    async fn list_issues(&self, filter: &IssueFilter) -> Result<Vec<Issue>, StoreError> {
        let index = self.read_index().await?;
        let mut issues = Vec::with_capacity(index.keys.len());
        for id in index.keys.values() {
            match self.get_issue_by_id(id).await {
                Ok(issue) => issues.push(issue),
                // Index entry without a file: the issue was removed out of band.
                Err(StoreError::NotFound { .. }) => {
                    tracing::debug!(issue_id = %id, "index entry without issue file");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(filter_issues(&issues, filter))
    }

    async fn get_project(&self, id: &str) -> Result<Project, StoreError> {
        let path = self
            .project_path(id)
            .ok_or_else(|| StoreError::project_not_found(id))?;
        self.read_json(&path, || StoreError::project_not_found(id)).await
    }
}
