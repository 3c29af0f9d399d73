//! Core domain types for issue hierarchies.
//!
//! This module defines the data structures the resolver works with: issues,
//! projects, issue references and the import dataset. Wire formats use
//! camelCase JSON to match the REST issue store.

use regex::Regex;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;
use uuid::Uuid;

static ISSUE_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z0-9]+)-(\d+)$").expect("issue key pattern is valid"));

/// Errors raised when building domain values from untrusted input.
#[derive(Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("Invalid issue key: '{0}' (expected PROJECT-N, e.g. POW-1)")]
    InvalidKey(String),

    #[error("Issue reference must not be empty")]
    EmptyReference,

    /// Record ids name files on disk, so they may not walk out of a directory.
    #[error("Invalid {kind} id '{id}': ids must not be empty, start with '.' or contain path separators")]
    InvalidId { kind: &'static str, id: String },
}

/// Issue type. Determines which hierarchy relationships are valid.
///
/// Unknown type names coming from the store are preserved in `Other` and
/// resolve through the default branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IssueType {
    Epic,
    Story,
    Task,
    Bug,
    Subtask,
    Other(String),
}

impl IssueType {
    pub fn as_str(&self) -> &str {
        match self {
            IssueType::Epic => "epic",
            IssueType::Story => "story",
            IssueType::Task => "task",
            IssueType::Bug => "bug",
            IssueType::Subtask => "subtask",
            IssueType::Other(name) => name,
        }
    }

    /// Story, task or bug.
    pub fn is_work_item(&self) -> bool {
        matches!(self, IssueType::Story | IssueType::Task | IssueType::Bug)
    }
}

impl From<String> for IssueType {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "epic" => IssueType::Epic,
            "story" => IssueType::Story,
            "task" => IssueType::Task,
            "bug" => IssueType::Bug,
            "subtask" | "sub-task" => IssueType::Subtask,
            _ => IssueType::Other(value),
        }
    }
}

impl From<IssueType> for String {
    fn from(value: IssueType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for IssueType {
    fn schema_name() -> String {
        "IssueType".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        String::json_schema(gen)
    }
}

/// A parsed `<PROJECT>-<N>` issue key.
///
/// Ordering is natural: `POW-2` sorts before `POW-10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueKey {
    pub project: String,
    pub number: u64,
}

impl IssueKey {
    /// Parse a key, rejecting anything that does not match `^[A-Z0-9]+-\d+$`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let caps = ISSUE_KEY_PATTERN
            .captures(raw)
            .ok_or_else(|| DomainError::InvalidKey(raw.to_string()))?;
        let number = caps[2]
            .parse()
            .map_err(|_| DomainError::InvalidKey(raw.to_string()))?;
        Ok(Self {
            project: caps[1].to_string(),
            number,
        })
    }
}

impl Ord for IssueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.project
            .cmp(&other.project)
            .then(self.number.cmp(&other.number))
    }
}

impl PartialOrd for IssueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.project, self.number)
    }
}

/// Explicit reference to an issue, either by stable id or by human key.
///
/// Callers decide which kind they hold when they build the reference; nothing
/// downstream guesses from the string shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum IssueRef {
    Id(String),
    Key(String),
}

impl IssueRef {
    pub fn id(value: impl Into<String>) -> Self {
        IssueRef::Id(value.into())
    }

    /// Key reference without format validation. Use for data read from a store.
    pub fn key(value: impl Into<String>) -> Self {
        IssueRef::Key(value.into())
    }

    /// Key reference from user input, validated against the key format.
    pub fn parse_key(value: &str) -> Result<Self, DomainError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(DomainError::EmptyReference);
        }
        IssueKey::parse(value)?;
        Ok(IssueRef::Key(value.to_string()))
    }

    pub fn value(&self) -> &str {
        match self {
            IssueRef::Id(v) | IssueRef::Key(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IssueRef::Id(_) => "id",
            IssueRef::Key(_) => "key",
        }
    }

    /// Whether this reference points at `issue`.
    pub fn matches(&self, issue: &Issue) -> bool {
        match self {
            IssueRef::Id(id) => issue.id == *id,
            IssueRef::Key(key) => issue.key == *key,
        }
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.value())
    }
}

/// An issue as the resolver sees it.
///
/// The epic reference is canonical: whichever of `epicId`, `epicLink` or
/// `epicKey` arrived on the wire is folded into `epic` at deserialization,
/// with the id forms taking precedence over the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IssueRecord", into = "IssueRecord")]
pub struct Issue {
    /// Opaque unique identifier
    pub id: String,
    /// Human key, e.g. `POW-5`
    pub key: String,
    pub issue_type: IssueType,
    /// Short display title
    pub summary: String,
    pub status: String,
    pub description: Option<String>,
    pub project_id: Option<String>,
    /// Parent issue id (subtasks, and bugs loosely linked to a story)
    pub parent_id: Option<String>,
    pub epic: Option<IssueRef>,
}

impl Issue {
    /// Create an issue with a generated id and no links.
    pub fn new(key: impl Into<String>, issue_type: IssueType, summary: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key: key.into(),
            issue_type,
            summary: summary.into(),
            status: default_status(),
            description: None,
            project_id: None,
            parent_id: None,
            epic: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_epic(mut self, epic: IssueRef) -> Self {
        self.epic = Some(epic);
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn is_epic(&self) -> bool {
        self.issue_type == IssueType::Epic
    }

    pub fn is_subtask(&self) -> bool {
        self.issue_type == IssueType::Subtask
    }

    /// Whether this issue's epic reference points at `epic`, by id or key.
    pub fn belongs_to_epic(&self, epic: &Issue) -> bool {
        self.epic.as_ref().is_some_and(|r| r.matches(epic))
    }

    /// Reference to this issue by its stable id.
    pub fn to_ref(&self) -> IssueRef {
        IssueRef::Id(self.id.clone())
    }

    /// Natural ordering key; unparseable keys sort after parsed ones.
    pub fn sort_key(&self) -> (bool, Option<IssueKey>, &str) {
        let parsed = IssueKey::parse(&self.key).ok();
        (parsed.is_none(), parsed, &self.key)
    }
}

impl JsonSchema for Issue {
    fn schema_name() -> String {
        "Issue".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        IssueRecord::json_schema(gen)
    }
}

fn default_status() -> String {
    "todo".to_string()
}

/// Wire shape of an issue as the REST store sends it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct IssueRecord {
    id: String,
    key: String,
    #[serde(rename = "type")]
    issue_type: IssueType,
    #[serde(default)]
    summary: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epic_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epic_key: Option<String>,
}

/// Empty strings from form-backed clients mean "unset".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<IssueRecord> for Issue {
    fn from(record: IssueRecord) -> Self {
        let epic_id = non_empty(record.epic_id);
        let epic_link = non_empty(record.epic_link);
        let epic_key = non_empty(record.epic_key);

        if let (Some(id), Some(link)) = (&epic_id, &epic_link) {
            if id != link {
                tracing::debug!(
                    issue = %record.key,
                    epic_id = %id,
                    epic_link = %link,
                    "conflicting epic references, using epicId"
                );
            }
        }

        let epic = epic_id
            .or(epic_link)
            .map(IssueRef::Id)
            .or(epic_key.map(IssueRef::Key));

        Self {
            id: record.id,
            key: record.key,
            issue_type: record.issue_type,
            summary: record.summary,
            status: record.status,
            description: record.description,
            project_id: non_empty(record.project_id),
            parent_id: non_empty(record.parent_id),
            epic,
        }
    }
}

impl From<Issue> for IssueRecord {
    fn from(issue: Issue) -> Self {
        let (epic_id, epic_key) = match issue.epic {
            Some(IssueRef::Id(id)) => (Some(id), None),
            Some(IssueRef::Key(key)) => (None, Some(key)),
            None => (None, None),
        };
        Self {
            id: issue.id,
            key: issue.key,
            issue_type: issue.issue_type,
            summary: issue.summary,
            status: issue.status,
            description: issue.description,
            project_id: issue.project_id,
            parent_id: issue.parent_id,
            epic_id,
            epic_link: None,
            epic_key,
        }
    }
}

/// Owning project of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub key: String,
    pub name: String,
}

impl Project {
    pub fn new(id: impl Into<String>, key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            name: name.into(),
        }
    }
}

/// Bulk import/export format: `{"projects": [...], "issues": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_type_parsing_is_case_insensitive() {
        assert_eq!(IssueType::from("Epic".to_string()), IssueType::Epic);
        assert_eq!(IssueType::from("sub-task".to_string()), IssueType::Subtask);
        assert_eq!(
            IssueType::from("initiative".to_string()),
            IssueType::Other("initiative".to_string())
        );
    }

    #[test]
    fn test_issue_key_natural_order() {
        let two = IssueKey::parse("POW-2").unwrap();
        let ten = IssueKey::parse("POW-10").unwrap();
        assert!(two < ten);
        assert_eq!(ten.to_string(), "POW-10");
    }

    #[test]
    fn test_parse_key_rejects_malformed_input() {
        assert!(IssueRef::parse_key("POW-1").is_ok());
        assert_eq!(
            IssueRef::parse_key("pow-1"),
            Err(DomainError::InvalidKey("pow-1".to_string()))
        );
        assert_eq!(
            IssueRef::parse_key("issue-7"),
            Err(DomainError::InvalidKey("issue-7".to_string()))
        );
        assert_eq!(IssueRef::parse_key("  "), Err(DomainError::EmptyReference));
    }

    #[test]
    fn test_epic_id_wins_over_link_and_key() {
        let issue: Issue = serde_json::from_value(json!({
            "id": "issue-5",
            "key": "POW-5",
            "type": "story",
            "epicId": "epic-1",
            "epicLink": "epic-9",
            "epicKey": "POW-9"
        }))
        .unwrap();
        assert_eq!(issue.epic, Some(IssueRef::id("epic-1")));
    }

    #[test]
    fn test_epic_link_is_an_id_and_key_is_last_resort() {
        let linked: Issue = serde_json::from_value(json!({
            "id": "a", "key": "POW-3", "type": "task", "epicLink": "epic-1", "epicKey": "POW-1"
        }))
        .unwrap();
        assert_eq!(linked.epic, Some(IssueRef::id("epic-1")));

        let keyed: Issue = serde_json::from_value(json!({
            "id": "b", "key": "POW-4", "type": "task", "epicKey": "POW-1"
        }))
        .unwrap();
        assert_eq!(keyed.epic, Some(IssueRef::key("POW-1")));
    }

    #[test]
    fn test_empty_wire_references_are_unset() {
        let issue: Issue = serde_json::from_value(json!({
            "id": "a", "key": "POW-3", "type": "task",
            "epicId": "", "parentId": " ", "projectId": ""
        }))
        .unwrap();
        assert_eq!(issue.epic, None);
        assert_eq!(issue.parent_id, None);
        assert_eq!(issue.project_id, None);
        assert_eq!(issue.status, "todo");
    }

    #[test]
    fn test_serializes_canonical_epic_field() {
        let issue = Issue::new("POW-5", IssueType::Story, "Login form")
            .with_id("issue-5")
            .with_epic(IssueRef::id("epic-1"));
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["epicId"], "epic-1");
        assert_eq!(value["type"], "story");
        assert!(value.get("epicLink").is_none());
        assert!(value.get("parentId").is_none());

        let back: Issue = serde_json::from_value(value).unwrap();
        assert_eq!(back, issue);
    }

    #[test]
    fn test_belongs_to_epic_by_id_or_key() {
        let epic = Issue::new("POW-1", IssueType::Epic, "Auth").with_id("epic-1");
        let by_id = Issue::new("POW-2", IssueType::Story, "a").with_epic(IssueRef::id("epic-1"));
        let by_key = Issue::new("POW-3", IssueType::Story, "b").with_epic(IssueRef::key("POW-1"));
        let other = Issue::new("POW-4", IssueType::Story, "c").with_epic(IssueRef::id("epic-2"));
        assert!(by_id.belongs_to_epic(&epic));
        assert!(by_key.belongs_to_epic(&epic));
        assert!(!other.belongs_to_epic(&epic));
    }
}
