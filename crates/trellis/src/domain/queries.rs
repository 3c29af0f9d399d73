//! Pure query operations on issue collections.
//!
//! These functions operate on slices of issues without storage access. Every
//! store backend filters and orders through them so listings are identical
//! regardless of where the data lives.

use crate::domain::{Issue, IssueRef};
use serde::{Deserialize, Serialize};

/// Filter for `list_issues`. All set fields must match.
///
/// `epic_id` and `epic_key` are alternatives: an issue matches when its epic
/// reference points at either one, so key-linked records are still found
/// when the caller only knows the epic's id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(
        default,
        rename = "epicLink",
        alias = "epicId",
        skip_serializing_if = "Option::is_none"
    )]
    pub epic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epic_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

impl IssueFilter {
    /// Every issue linked to `epic`.
    pub fn children_of_epic(epic: &Issue) -> Self {
        Self {
            epic_id: Some(epic.id.clone()),
            epic_key: Some(epic.key.clone()),
            ..Self::default()
        }
    }

    /// Every issue whose parent is `parent_id`.
    pub fn children_of(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id.into()),
            ..Self::default()
        }
    }

    pub fn in_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.project_id.is_none()
            && self.epic_id.is_none()
            && self.epic_key.is_none()
            && self.parent_id.is_none()
    }

    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(project_id) = &self.project_id {
            if issue.project_id.as_deref() != Some(project_id.as_str()) {
                return false;
            }
        }

        if let Some(parent_id) = &self.parent_id {
            if issue.parent_id.as_deref() != Some(parent_id.as_str()) {
                return false;
            }
        }

        if self.epic_id.is_some() || self.epic_key.is_some() {
            let linked = match &issue.epic {
                Some(IssueRef::Id(id)) => self.epic_id.as_deref() == Some(id.as_str()),
                Some(IssueRef::Key(key)) => self.epic_key.as_deref() == Some(key.as_str()),
                None => false,
            };
            if !linked {
                return false;
            }
        }

        true
    }
}

/// Sort issues in natural key order (`POW-2` before `POW-10`).
pub fn sort_by_key(issues: &mut [Issue]) {
    issues.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

/// Apply `filter` and return matches in natural key order.
pub fn filter_issues<'a>(issues: impl IntoIterator<Item = &'a Issue>, filter: &IssueFilter) -> Vec<Issue> {
    let mut matched: Vec<Issue> = issues
        .into_iter()
        .filter(|issue| filter.matches(issue))
        .cloned()
        .collect();
    sort_by_key(&mut matched);
    matched
}
