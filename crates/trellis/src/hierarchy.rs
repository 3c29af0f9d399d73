//! Hierarchy resolution for breadcrumbs and hierarchy trees.
//!
//! Given a focus issue, the resolver walks its ancestors (project, epic,
//! parent) and descendants (children, subtasks) through an [`IssueStore`].
//!
//! Only the focus lookup is allowed to fail a resolution. Every other fetch is
//! guarded on its own: a missing or unreachable ancestor simply drops its
//! segment, logged at `warn`, and the rest of the hierarchy still renders.
//! Independent fetches are issued concurrently; dependent ones (siblings need
//! the parent first) are sequenced.

use crate::domain::{Issue, IssueFilter, IssueRef, IssueType};
use crate::storage::{IssueStore, StoreError};
use crate::type_hierarchy::HierarchySettings;
use futures::future::join_all;
use futures::join;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

/// Terminal failures of a resolution. Only the focus issue can cause one.
#[derive(Debug, Error, PartialEq)]
pub enum ResolveError {
    #[error("Focus issue not found: {0}")]
    FocusNotFound(IssueRef),

    #[error("Failed to load focus issue {reference}: {source}")]
    Store {
        reference: IssueRef,
        #[source]
        source: StoreError,
    },
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResolveError::FocusNotFound(_))
    }
}

/// One segment of a breadcrumb trail. `path` is `None` for the terminal,
/// non-clickable segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Breadcrumb {
    pub label: String,
    pub path: Option<String>,
}

impl Breadcrumb {
    fn link(label: impl Into<String>, path: String) -> Self {
        Self {
            label: label.into(),
            path: Some(path),
        }
    }

    fn terminal(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.path.is_none()
    }
}

/// An issue placed at an indentation level (0, 1 or 2).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TreeNode {
    pub issue: Issue,
    pub level: u8,
}

impl TreeNode {
    pub fn new(issue: Issue, level: u8) -> Self {
        Self { issue, level }
    }
}

pub fn project_path(project_id: &str) -> String {
    format!("/project/{}", project_id)
}

pub fn issue_path(issue_key: &str) -> String {
    format!("/issue/{}", issue_key)
}

/// Await a guarded fetch: failures are logged and become `None`.
async fn optional<T>(
    segment: &'static str,
    fetch: impl Future<Output = Result<T, StoreError>>,
) -> Option<T> {
    match fetch.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(segment, error = %e, "omitting hierarchy segment");
            None
        }
    }
}

/// Await a guarded listing: failures are logged and become an empty list.
async fn listing(
    segment: &'static str,
    fetch: impl Future<Output = Result<Vec<Issue>, StoreError>>,
) -> Vec<Issue> {
    optional(segment, fetch).await.unwrap_or_default()
}

/// Guarded listing of subtasks only. A bug may carry `parentId` as a loose
/// link to a story; that does not make it a subtask.
async fn subtasks(
    segment: &'static str,
    fetch: impl Future<Output = Result<Vec<Issue>, StoreError>>,
) -> Vec<Issue> {
    let mut issues = listing(segment, fetch).await;
    issues.retain(Issue::is_subtask);
    issues
}

/// Read-only resolver over an issue store.
///
/// # Examples
///
/// ```
/// use trellis::demo::demo_dataset;
/// use trellis::domain::IssueRef;
/// use trellis::hierarchy::HierarchyResolver;
/// use trellis::storage::InMemoryStorage;
///
/// # #[tokio::main]
/// # async fn main() {
/// let resolver = HierarchyResolver::new(InMemoryStorage::from_dataset(demo_dataset()));
/// let trail = resolver
///     .resolve_breadcrumbs(&IssueRef::key("POW-5"))
///     .await
///     .unwrap();
///
/// let labels: Vec<_> = trail.iter().map(|b| b.label.as_str()).collect();
/// assert_eq!(labels, ["Demo Project", "POW-1", "POW-5"]);
/// assert!(trail.last().unwrap().is_terminal());
/// # }
/// ```
#[derive(Clone)]
pub struct HierarchyResolver<S: IssueStore> {
    store: S,
    settings: HierarchySettings,
}

impl<S: IssueStore> HierarchyResolver<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, HierarchySettings::default())
    }

    pub fn with_settings(store: S, settings: HierarchySettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> HierarchySettings {
        self.settings
    }

    /// Fetch the focus issue. The only fetch whose failure is terminal.
    pub async fn fetch_focus(&self, focus: &IssueRef) -> Result<Issue, ResolveError> {
        self.store.get_issue(focus).await.map_err(|e| {
            warn!(focus = %focus, error = %e, "focus issue unavailable");
            if e.is_not_found() {
                ResolveError::FocusNotFound(focus.clone())
            } else {
                ResolveError::Store {
                    reference: focus.clone(),
                    source: e,
                }
            }
        })
    }

    /// Breadcrumb trail from the root ancestor to the focus issue.
    ///
    /// The last element is always the focus key with no path.
    ///
    /// # Errors
    ///
    /// Fails only when the focus issue itself cannot be fetched.
    pub async fn resolve_breadcrumbs(
        &self,
        focus: &IssueRef,
    ) -> Result<Vec<Breadcrumb>, ResolveError> {
        let issue = self.fetch_focus(focus).await?;
        Ok(self.breadcrumbs_for(&issue).await)
    }

    /// Breadcrumb trail for an already fetched focus issue.
    pub async fn breadcrumbs_for(&self, focus: &Issue) -> Vec<Breadcrumb> {
        let project = async {
            match &focus.project_id {
                Some(id) => optional("project", self.store.get_project(id)).await,
                None => None,
            }
        };
        let epic = async {
            match &focus.epic {
                Some(epic_ref) if !focus.is_epic() => {
                    optional("epic", self.store.get_issue(epic_ref)).await
                }
                _ => None,
            }
        };
        let parent = async {
            match &focus.parent_id {
                Some(id) => optional("parent", self.store.get_issue_by_id(id)).await,
                None => None,
            }
        };

        let (project, epic, parent) = join!(project, epic, parent);

        let mut trail = Vec::with_capacity(4);
        if let Some(project) = project {
            trail.push(Breadcrumb::link(project.name, project_path(&project.id)));
        }
        if let Some(epic) = epic {
            let path = issue_path(&epic.key);
            trail.push(Breadcrumb::link(epic.key, path));
        }
        if let Some(parent) = parent {
            let path = issue_path(&parent.key);
            trail.push(Breadcrumb::link(parent.key, path));
        }
        trail.push(Breadcrumb::terminal(focus.key.clone()));

        debug!(focus = %focus.key, segments = trail.len(), "breadcrumbs resolved");
        trail
    }

    /// Fetch the focus issue and resolve its tree.
    ///
    /// # Errors
    ///
    /// Fails only when the focus issue itself cannot be fetched.
    pub async fn resolve_tree(&self, focus: &IssueRef) -> Result<Vec<TreeNode>, ResolveError> {
        let issue = self.fetch_focus(focus).await?;
        Ok(self.resolve_hierarchy_tree(&issue).await)
    }

    /// Leveled nodes of the locally visible hierarchy around `focus`.
    ///
    /// Ancestors come first, then the focus generation, then descendants.
    /// The result is never empty: at worst it is the focus alone at level 0.
    pub async fn resolve_hierarchy_tree(&self, focus: &Issue) -> Vec<TreeNode> {
        let nodes = match (&focus.issue_type, &focus.parent_id) {
            (IssueType::Subtask, Some(parent_id)) => self.subtask_tree(focus, parent_id).await,
            (IssueType::Epic, _) => self.epic_tree(focus).await,
            (issue_type, _) if issue_type.is_work_item() => self.work_item_tree(focus).await,
            _ => vec![TreeNode::new(focus.clone(), 0)],
        };

        debug!(focus = %focus.key, nodes = nodes.len(), "hierarchy tree resolved");
        nodes
    }

    /// Subtask: [epic@0], parent@1, focus and siblings@2.
    async fn subtask_tree(&self, focus: &Issue, parent_id: &str) -> Vec<TreeNode> {
        let Some(parent) = optional("parent", self.store.get_issue_by_id(parent_id)).await else {
            return vec![TreeNode::new(focus.clone(), 0)];
        };

        let sibling_filter = IssueFilter::children_of(parent.id.clone());
        let epic = async {
            match &parent.epic {
                Some(epic_ref) if !parent.is_epic() => {
                    optional("epic", self.store.get_issue(epic_ref)).await
                }
                _ => None,
            }
        };
        let siblings = subtasks("siblings", self.store.list_issues(&sibling_filter));
        let (epic, siblings) = join!(epic, siblings);

        let mut nodes = Vec::with_capacity(siblings.len() + 3);
        if let Some(epic) = epic {
            nodes.push(TreeNode::new(epic, 0));
        }
        nodes.push(TreeNode::new(parent, 1));
        nodes.push(TreeNode::new(focus.clone(), 2));
        nodes.extend(
            siblings
                .into_iter()
                .filter(|sibling| sibling.id != focus.id)
                .map(|sibling| TreeNode::new(sibling, 2)),
        );
        nodes
    }

    /// Story, task or bug: [epic@0], focus@1, subtasks@2.
    async fn work_item_tree(&self, focus: &Issue) -> Vec<TreeNode> {
        let child_filter = IssueFilter::children_of(focus.id.clone());
        let epic = async {
            match &focus.epic {
                Some(epic_ref) => optional("epic", self.store.get_issue(epic_ref)).await,
                None => None,
            }
        };
        let children = async {
            if self.settings.includes_children() {
                subtasks("subtasks", self.store.list_issues(&child_filter)).await
            } else {
                Vec::new()
            }
        };
        let (epic, children) = join!(epic, children);

        let mut nodes = Vec::with_capacity(children.len() + 2);
        if let Some(epic) = epic {
            nodes.push(TreeNode::new(epic, 0));
        }
        nodes.push(TreeNode::new(focus.clone(), 1));
        nodes.extend(children.into_iter().map(|child| TreeNode::new(child, 2)));
        nodes
    }

    /// Epic: focus@0, linked issues@1, and their subtasks@2 only when the
    /// depth limit allows grandchildren.
    async fn epic_tree(&self, focus: &Issue) -> Vec<TreeNode> {
        let mut nodes = vec![TreeNode::new(focus.clone(), 0)];
        if !self.settings.includes_children() {
            return nodes;
        }

        let filter = IssueFilter::children_of_epic(focus);
        let children: Vec<Issue> = listing("epic children", self.store.list_issues(&filter))
            .await
            .into_iter()
            .filter(|child| child.id != focus.id)
            .collect();

        if !self.settings.includes_grandchildren() {
            nodes.extend(children.into_iter().map(|child| TreeNode::new(child, 1)));
            return nodes;
        }

        let grandchildren = join_all(children.iter().map(|child| {
            let filter = IssueFilter::children_of(child.id.clone());
            async move { subtasks("subtasks", self.store.list_issues(&filter)).await }
        }))
        .await;

        for (child, subtasks) in children.into_iter().zip(grandchildren) {
            nodes.push(TreeNode::new(child, 1));
            nodes.extend(subtasks.into_iter().map(|subtask| TreeNode::new(subtask, 2)));
        }
        nodes
    }
}

#[cfg(test)]
#[path = "hierarchy_proptests.rs"]
mod proptests;
