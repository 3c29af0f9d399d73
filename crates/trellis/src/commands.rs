//! Command execution logic for the CLI operations.
//!
//! The `CommandExecutor` runs every read command against any
//! [`IssueStore`], so the same code serves the local data directory and the
//! remote API. Setup commands that only make sense for the local directory
//! (`init`, `import`) are free functions over [`JsonFileStorage`].

use crate::config::{CONFIG_FILE, DEFAULT_CONFIG_TOML};
use crate::demo::demo_dataset;
use crate::domain::{Dataset, Issue, IssueFilter, IssueRef};
use crate::hierarchy::{Breadcrumb, HierarchyResolver, ResolveError, TreeNode};
use crate::storage::{IssueStore, JsonFileStorage, StoreError};
use crate::type_hierarchy::{validate_hierarchy, HierarchySettings, HierarchyWarning};
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

/// Outcome of `validate`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub issues_checked: usize,
    pub warnings: Vec<HierarchyWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.warnings.is_empty()
    }
}

pub struct CommandExecutor<S: IssueStore> {
    resolver: HierarchyResolver<S>,
}

impl<S: IssueStore> CommandExecutor<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, HierarchySettings::default())
    }

    pub fn with_settings(store: S, settings: HierarchySettings) -> Self {
        Self {
            resolver: HierarchyResolver::with_settings(store, settings),
        }
    }

    pub fn store(&self) -> &S {
        self.resolver.store()
    }

    pub fn settings(&self) -> HierarchySettings {
        self.resolver.settings()
    }

    pub async fn show(&self, focus: &IssueRef) -> Result<Issue, ResolveError> {
        self.resolver.fetch_focus(focus).await
    }

    pub async fn list(&self, filter: &IssueFilter) -> Result<Vec<Issue>, StoreError> {
        self.store().list_issues(filter).await
    }

    pub async fn breadcrumbs(&self, focus: &IssueRef) -> Result<Vec<Breadcrumb>, ResolveError> {
        self.resolver.resolve_breadcrumbs(focus).await
    }

    pub async fn tree(&self, focus: &IssueRef) -> Result<Vec<TreeNode>, ResolveError> {
        self.resolver.resolve_tree(focus).await
    }

    /// Check every stored issue against the hierarchy rules.
    pub async fn validate(&self) -> Result<ValidationReport, StoreError> {
        let issues = self.store().list_issues(&IssueFilter::default()).await?;
        let warnings = validate_hierarchy(&issues);
        info!(
            issues = issues.len(),
            warnings = warnings.len(),
            "hierarchy validated"
        );
        Ok(ValidationReport {
            issues_checked: issues.len(),
            warnings,
        })
    }
}

/// Create the data directory and a default `config.toml`, optionally
/// seeding the demo project.
///
/// Returns how many issues were imported.
pub async fn init(storage: &JsonFileStorage, demo: bool) -> Result<usize> {
    storage.init().await?;

    let config_path = storage.root().join(CONFIG_FILE);
    if !tokio::fs::try_exists(&config_path).await.unwrap_or(false) {
        tokio::fs::write(&config_path, DEFAULT_CONFIG_TOML)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    if !demo {
        return Ok(0);
    }
    storage.import(demo_dataset()).await
}

/// Parse a `{projects, issues}` file and import it.
pub async fn import_file(storage: &JsonFileStorage, path: &Path) -> Result<usize> {
    storage.validate().await?;
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let dataset: Dataset = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid dataset in {}", path.display()))?;

    let count = storage.import(dataset).await?;
    info!(count, file = %path.display(), "dataset imported");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueType, Project};
    use crate::storage::InMemoryStorage;
    use tempfile::TempDir;

    fn executor() -> CommandExecutor<InMemoryStorage> {
        CommandExecutor::new(InMemoryStorage::from_dataset(demo_dataset()))
    }

    #[tokio::test]
    async fn test_show_by_key() {
        let issue = executor().show(&IssueRef::key("POW-5")).await.unwrap();
        assert_eq!(issue.id, "issue-5");
        assert_eq!(issue.status, "in_progress");
    }

    #[tokio::test]
    async fn test_list_by_parent() {
        let issues = executor()
            .list(&IssueFilter::children_of("issue-7"))
            .await
            .unwrap();
        let keys: Vec<_> = issues.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, ["POW-8", "POW-9", "POW-10"]);
    }

    #[tokio::test]
    async fn test_validate_demo_reports_dangling_parent() {
        let report = executor().validate().await.unwrap();
        assert_eq!(report.issues_checked, demo_dataset().issues.len());
        assert!(!report.is_valid());
        assert!(report.warnings.contains(&HierarchyWarning::DanglingReference {
            issue_key: "POW-12".into(),
            field: "parentId",
            reference: "missing-parent".into(),
        }));
    }

    #[tokio::test]
    async fn test_tree_respects_settings() {
        let settings = HierarchySettings::new(1).unwrap();
        let executor =
            CommandExecutor::with_settings(InMemoryStorage::from_dataset(demo_dataset()), settings);
        let nodes = executor.tree(&IssueRef::key("POW-1")).await.unwrap();
        assert_eq!(nodes.len(), 1);
    }

    #[tokio::test]
    async fn test_init_demo_then_resolve_from_files() {
        let temp = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp.path());

        let count = init(&storage, true).await.unwrap();
        assert_eq!(count, demo_dataset().issues.len());
        assert!(temp.path().join(CONFIG_FILE).exists());

        let executor = CommandExecutor::new(storage);
        let trail = executor
            .breadcrumbs(&IssueRef::key("POW-5"))
            .await
            .unwrap();
        let labels: Vec<_> = trail.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Demo Project", "POW-1", "POW-5"]);
    }

    #[tokio::test]
    async fn test_import_file_reads_wire_format() {
        let temp = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp.path().join(".trellis"));
        init(&storage, false).await.unwrap();

        let file = temp.path().join("issues.json");
        std::fs::write(
            &file,
            r#"{
                "projects": [{"id": "p", "key": "ACME", "name": "Acme"}],
                "issues": [
                    {"id": "e", "key": "ACME-1", "type": "Epic", "summary": "Epic", "projectId": "p"},
                    {"id": "s", "key": "ACME-2", "type": "story", "summary": "Story", "epicLink": "e"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(import_file(&storage, &file).await.unwrap(), 2);

        let story = storage.get_issue_by_key("ACME-2").await.unwrap();
        assert_eq!(story.epic, Some(IssueRef::id("e")));
        assert_eq!(
            storage.get_project("p").await.unwrap(),
            Project::new("p", "ACME", "Acme")
        );
        assert_eq!(
            storage.get_issue_by_id("e").await.unwrap().issue_type,
            IssueType::Epic
        );
    }

    #[tokio::test]
    async fn test_import_requires_init() {
        let temp = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(temp.path().join(".trellis"));
        let file = temp.path().join("issues.json");
        std::fs::write(&file, "{}").unwrap();

        assert!(import_file(&storage, &file).await.is_err());
    }
}
