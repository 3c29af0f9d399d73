//! Type hierarchy rules: depth limits and invariant checks.
//!
//! # Hierarchy shape
//!
//! ```text
//! epic (level 0)
//! └── story / task / bug (level 1)
//!     └── subtask (level 2)
//! ```
//!
//! The resolver never enforces these rules on read: a malformed record still
//! renders. This module only reports violations so `trellis validate` can
//! surface them.
//!
//! # Examples
//!
//! ```
//! use trellis::type_hierarchy::HierarchySettings;
//!
//! let settings = HierarchySettings::default();
//! assert_eq!(settings.max_depth(), 2);
//! assert!(settings.includes_children());
//! assert!(!settings.includes_grandchildren());
//! ```

use crate::domain::{Issue, IssueRef, IssueType};
use std::collections::HashMap;
use thiserror::Error;

/// Deepest level index in the epic → work item → subtask hierarchy.
pub const MAX_LEVEL: u8 = 2;

/// Default number of generations rendered from the focus issue downwards.
pub const DEFAULT_MAX_HIERARCHY_DEPTH: u8 = 2;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid max hierarchy depth {0}: must be between 1 and {max}", max = MAX_LEVEL + 1)]
    InvalidDepth(u8),

    #[error("Invalid API URL: {0} (expected an http(s) base such as http://localhost:3000/api)")]
    InvalidApiUrl(String),
}

/// Resolver settings.
///
/// `max_depth` counts generations starting at the focus issue's own
/// generation: 1 shows no descendants, 2 adds direct children, 3 also adds
/// grandchildren (only reachable from an epic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchySettings {
    max_depth: u8,
}

impl Default for HierarchySettings {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_HIERARCHY_DEPTH,
        }
    }
}

impl HierarchySettings {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDepth` unless `1 <= max_depth <= 3`.
    pub fn new(max_depth: u8) -> Result<Self, ConfigError> {
        if max_depth == 0 || max_depth > MAX_LEVEL + 1 {
            return Err(ConfigError::InvalidDepth(max_depth));
        }
        Ok(Self { max_depth })
    }

    pub fn max_depth(&self) -> u8 {
        self.max_depth
    }

    pub fn includes_children(&self) -> bool {
        self.max_depth >= 2
    }

    pub fn includes_grandchildren(&self) -> bool {
        self.max_depth >= 3
    }
}

/// A violated hierarchy invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum HierarchyWarning {
    /// An epic carries a parent or an epic reference
    EpicNotRoot { issue_key: String },
    /// A subtask's parent is itself a subtask
    NestedSubtask { issue_key: String, parent_key: String },
    /// A subtask has no parent
    OrphanedSubtask { issue_key: String },
    /// A parent or epic reference points at nothing in the store
    DanglingReference {
        issue_key: String,
        field: &'static str,
        reference: String,
    },
    /// An epic reference points at an issue that is not an epic
    EpicLinkNotEpic { issue_key: String, target_key: String },
    /// A type outside the known hierarchy
    UnknownType { issue_key: String, type_name: String },
}

impl std::fmt::Display for HierarchyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HierarchyWarning::EpicNotRoot { issue_key } => {
                write!(f, "{}: epic must not have a parent or epic link", issue_key)
            }
            HierarchyWarning::NestedSubtask {
                issue_key,
                parent_key,
            } => write!(
                f,
                "{}: subtask parent {} is itself a subtask",
                issue_key, parent_key
            ),
            HierarchyWarning::OrphanedSubtask { issue_key } => {
                write!(f, "{}: subtask has no parent", issue_key)
            }
            HierarchyWarning::DanglingReference {
                issue_key,
                field,
                reference,
            } => write!(f, "{}: {} '{}' does not exist", issue_key, field, reference),
            HierarchyWarning::EpicLinkNotEpic {
                issue_key,
                target_key,
            } => write!(f, "{}: epic link {} is not an epic", issue_key, target_key),
            HierarchyWarning::UnknownType {
                issue_key,
                type_name,
            } => write!(f, "{}: unknown issue type '{}'", issue_key, type_name),
        }
    }
}

/// Check every issue against the hierarchy invariants.
///
/// Warnings come back in the order of `issues`.
pub fn validate_hierarchy(issues: &[Issue]) -> Vec<HierarchyWarning> {
    let by_id: HashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();
    let by_key: HashMap<&str, &Issue> = issues.iter().map(|i| (i.key.as_str(), i)).collect();

    let mut warnings = Vec::new();

    for issue in issues {
        if let IssueType::Other(name) = &issue.issue_type {
            warnings.push(HierarchyWarning::UnknownType {
                issue_key: issue.key.clone(),
                type_name: name.clone(),
            });
        }

        if issue.is_epic() && (issue.parent_id.is_some() || issue.epic.is_some()) {
            warnings.push(HierarchyWarning::EpicNotRoot {
                issue_key: issue.key.clone(),
            });
        }

        match &issue.parent_id {
            Some(parent_id) => match by_id.get(parent_id.as_str()) {
                Some(parent) if issue.is_subtask() && parent.is_subtask() => {
                    warnings.push(HierarchyWarning::NestedSubtask {
                        issue_key: issue.key.clone(),
                        parent_key: parent.key.clone(),
                    });
                }
                Some(_) => {}
                None => warnings.push(HierarchyWarning::DanglingReference {
                    issue_key: issue.key.clone(),
                    field: "parentId",
                    reference: parent_id.clone(),
                }),
            },
            None if issue.is_subtask() => warnings.push(HierarchyWarning::OrphanedSubtask {
                issue_key: issue.key.clone(),
            }),
            None => {}
        }

        if let Some(epic_ref) = &issue.epic {
            let target = match epic_ref {
                IssueRef::Id(id) => by_id.get(id.as_str()),
                IssueRef::Key(key) => by_key.get(key.as_str()),
            };
            match target {
                Some(target) if !target.is_epic() => {
                    warnings.push(HierarchyWarning::EpicLinkNotEpic {
                        issue_key: issue.key.clone(),
                        target_key: target.key.clone(),
                    });
                }
                Some(_) => {}
                None => warnings.push(HierarchyWarning::DanglingReference {
                    issue_key: issue.key.clone(),
                    field: "epic",
                    reference: epic_ref.value().to_string(),
                }),
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_bounds() {
        assert_eq!(HierarchySettings::new(0), Err(ConfigError::InvalidDepth(0)));
        assert_eq!(HierarchySettings::new(4), Err(ConfigError::InvalidDepth(4)));
        assert!(HierarchySettings::new(1).is_ok());
        assert!(HierarchySettings::new(3).unwrap().includes_grandchildren());
        assert!(!HierarchySettings::new(1).unwrap().includes_children());
    }

    #[test]
    fn test_invalid_depth_message() {
        let msg = ConfigError::InvalidDepth(9).to_string();
        assert_eq!(msg, "Invalid max hierarchy depth 9: must be between 1 and 3");
    }

    #[test]
    fn test_well_formed_hierarchy_has_no_warnings() {
        let issues = vec![
            Issue::new("POW-1", IssueType::Epic, "Epic").with_id("e"),
            Issue::new("POW-2", IssueType::Story, "Story")
                .with_id("s")
                .with_epic(IssueRef::id("e")),
            Issue::new("POW-3", IssueType::Subtask, "Sub")
                .with_id("t")
                .with_parent("s"),
        ];
        assert!(validate_hierarchy(&issues).is_empty());
    }

    #[test]
    fn test_reports_each_violation() {
        let issues = vec![
            Issue::new("POW-1", IssueType::Epic, "Epic")
                .with_id("e")
                .with_parent("s"),
            Issue::new("POW-2", IssueType::Story, "Story")
                .with_id("s")
                .with_epic(IssueRef::key("POW-3")),
            Issue::new("POW-3", IssueType::Subtask, "Sub")
                .with_id("t")
                .with_parent("s"),
            Issue::new("POW-4", IssueType::Subtask, "Nested")
                .with_id("u")
                .with_parent("t"),
            Issue::new("POW-5", IssueType::Subtask, "Orphan").with_id("v"),
            Issue::new("POW-6", IssueType::Bug, "Dangling")
                .with_id("w")
                .with_epic(IssueRef::id("gone")),
            Issue::new("POW-7", IssueType::Other("spike".into()), "Spike").with_id("x"),
        ];

        let warnings = validate_hierarchy(&issues);
        assert_eq!(
            warnings,
            vec![
                HierarchyWarning::EpicNotRoot {
                    issue_key: "POW-1".into()
                },
                HierarchyWarning::EpicLinkNotEpic {
                    issue_key: "POW-2".into(),
                    target_key: "POW-3".into()
                },
                HierarchyWarning::NestedSubtask {
                    issue_key: "POW-4".into(),
                    parent_key: "POW-3".into()
                },
                HierarchyWarning::OrphanedSubtask {
                    issue_key: "POW-5".into()
                },
                HierarchyWarning::DanglingReference {
                    issue_key: "POW-6".into(),
                    field: "epic",
                    reference: "gone".into()
                },
                HierarchyWarning::UnknownType {
                    issue_key: "POW-7".into(),
                    type_name: "spike".into()
                },
            ]
        );
        assert_eq!(warnings[3].to_string(), "POW-5: subtask has no parent");
    }
}
