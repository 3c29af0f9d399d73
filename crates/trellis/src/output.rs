//! Structured output formatting for CLI commands.
//!
//! Human output is plain text (breadcrumb trail, indented tree). With `--json`
//! every command prints a `JsonOutput` envelope on success and a `JsonError`
//! envelope on failure, so scripts can rely on one shape.

use chrono::Utc;
use schemars::{schema_for, JsonSchema};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt::Display;
use std::io::{self, Write};

use crate::domain::{Issue, IssueRef};
use crate::hierarchy::{Breadcrumb, TreeNode};

/// Version of the JSON output format
pub const OUTPUT_VERSION: &str = "0.1.0";

/// Separator between breadcrumb segments in text output.
pub const BREADCRUMB_SEPARATOR: &str = " › ";

// ============================================================================
// Output Context for Quiet Mode
// ============================================================================

/// Context for controlling output verbosity
pub struct OutputContext {
    quiet: bool,
    json: bool,
}

impl OutputContext {
    pub fn new(quiet: bool, json: bool) -> Self {
        Self { quiet, json }
    }

    /// Print essential output (always shown unless --json)
    pub fn print_data(&self, msg: impl Display) -> io::Result<()> {
        if !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print informational message (suppressed by --quiet or --json)
    pub fn print_info(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe(&format!("{}", msg))
        } else {
            Ok(())
        }
    }

    /// Print warning (suppressed by --quiet or --json)
    pub fn print_warning(&self, msg: impl Display) -> io::Result<()> {
        if !self.quiet && !self.json {
            writeln_safe_stderr(&format!("Warning: {}", msg))
        } else {
            Ok(())
        }
    }

    /// Print a JSON document (only in --json mode)
    pub fn print_json<T: Serialize>(&self, output: &JsonOutput<T>) -> io::Result<()> {
        if self.json {
            let json = output.to_json_string().map_err(io::Error::other)?;
            writeln_safe(&json)
        } else {
            Ok(())
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }
}

/// Safe println that handles broken pipes gracefully
fn writeln_safe(msg: &str) -> io::Result<()> {
    match writeln!(io::stdout(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            // Expected when piping to head
            std::process::exit(0);
        }
        Err(e) => Err(e),
    }
}

fn writeln_safe_stderr(msg: &str) -> io::Result<()> {
    match writeln!(io::stderr(), "{}", msg) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => std::process::exit(0),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Text Rendering
// ============================================================================

/// `Demo Project › POW-1 › POW-5`
pub fn render_breadcrumbs(trail: &[Breadcrumb]) -> String {
    trail
        .iter()
        .map(|crumb| crumb.label.as_str())
        .collect::<Vec<_>>()
        .join(BREADCRUMB_SEPARATOR)
}

fn render_issue_line(issue: &Issue) -> String {
    format!(
        "{} [{}] {} ({})",
        issue.key, issue.issue_type, issue.summary, issue.status
    )
}

/// One line per node, indented two spaces per level. The focus line is
/// marked with `*`.
pub fn render_tree(nodes: &[TreeNode], focus: &IssueRef) -> String {
    nodes
        .iter()
        .map(|node| {
            let marker = if focus.matches(&node.issue) { "* " } else { "  " };
            format!(
                "{}{}{}",
                "  ".repeat(usize::from(node.level)),
                marker,
                render_issue_line(&node.issue)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Multi-line detail view for `show`.
pub fn render_issue(issue: &Issue) -> String {
    let mut out = format!("{}\n", render_issue_line(issue));
    out.push_str(&format!("  id:      {}\n", issue.id));
    if let Some(project_id) = &issue.project_id {
        out.push_str(&format!("  project: {}\n", project_id));
    }
    if let Some(epic) = &issue.epic {
        out.push_str(&format!("  epic:    {}\n", epic));
    }
    if let Some(parent_id) = &issue.parent_id {
        out.push_str(&format!("  parent:  {}\n", parent_id));
    }
    if let Some(description) = &issue.description {
        out.push_str(&format!("\n{}\n", description));
    }
    out.trim_end().to_string()
}

pub fn render_issue_list(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(render_issue_line)
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// JSON Output Types
// ============================================================================

/// Wrapper for successful command output with metadata
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub metadata: Metadata,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn success(data: T, command: impl Into<String>) -> Self {
        Self {
            success: true,
            data,
            metadata: Metadata::new(command),
        }
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Wrapper for error output with suggestions
#[derive(Debug, Serialize)]
pub struct JsonError {
    pub success: bool,
    pub error: ErrorDetail,
    pub metadata: Metadata,
}

impl JsonError {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
                suggestions: Vec::new(),
            },
            metadata: Metadata::new(command),
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.error.suggestions.push(suggestion.into());
        self
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        ErrorCode::to_exit_code(&self.error.code)
    }

    pub fn issue_not_found(reference: &IssueRef, command: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ISSUE_NOT_FOUND,
            format!("Issue not found: {}", reference),
            command,
        )
        .with_details(serde_json::json!({ "focus": reference }))
        .with_suggestion("Run 'trellis list' to see available issues")
    }
}

/// Error details including code, message, and suggestions
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    /// Error code (e.g., "ISSUE_NOT_FOUND", "STORE_UNAVAILABLE")
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

// ============================================================================
// Exit Codes
// ============================================================================

/// Standardized exit codes for the trellis CLI
///
/// # Examples
///
/// ```rust
/// use trellis::output::ExitCode;
///
/// assert_eq!(ExitCode::NotFound.code(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded (0)
    Success = 0,

    /// Generic error (1)
    GenericError = 1,

    /// Invalid arguments or usage error (2)
    InvalidArgument = 2,

    /// Focus issue, project or data directory not found (3)
    NotFound = 3,

    /// Issue store unreachable or misbehaving (10)
    ExternalError = 10,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            ExitCode::Success => "Command succeeded",
            ExitCode::GenericError => "Generic error occurred",
            ExitCode::InvalidArgument => "Invalid arguments or usage error",
            ExitCode::NotFound => "Resource not found (issue, project, data directory)",
            ExitCode::ExternalError => "Issue store failed (transport, status, decode)",
        }
    }

    pub fn all() -> [ExitCode; 5] {
        [
            ExitCode::Success,
            ExitCode::GenericError,
            ExitCode::InvalidArgument,
            ExitCode::NotFound,
            ExitCode::ExternalError,
        ]
    }
}

/// Standard error codes (string constants for JSON responses)
pub struct ErrorCode;

impl ErrorCode {
    pub const ISSUE_NOT_FOUND: &'static str = "ISSUE_NOT_FOUND";
    pub const NOT_INITIALIZED: &'static str = "NOT_INITIALIZED";
    pub const INVALID_ARGUMENT: &'static str = "INVALID_ARGUMENT";
    pub const STORE_UNAVAILABLE: &'static str = "STORE_UNAVAILABLE";
    pub const INTERNAL: &'static str = "INTERNAL";

    /// Map error code string to exit code
    pub fn to_exit_code(code: &str) -> ExitCode {
        match code {
            Self::ISSUE_NOT_FOUND | Self::NOT_INITIALIZED => ExitCode::NotFound,
            Self::INVALID_ARGUMENT => ExitCode::InvalidArgument,
            Self::STORE_UNAVAILABLE => ExitCode::ExternalError,
            _ => ExitCode::GenericError,
        }
    }

    pub fn from_exit_code(code: ExitCode) -> &'static str {
        match code {
            ExitCode::NotFound => Self::ISSUE_NOT_FOUND,
            ExitCode::InvalidArgument => Self::INVALID_ARGUMENT,
            ExitCode::ExternalError => Self::STORE_UNAVAILABLE,
            ExitCode::Success | ExitCode::GenericError => Self::INTERNAL,
        }
    }
}

/// Metadata included in all responses
#[derive(Debug, Serialize)]
pub struct Metadata {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: chrono::DateTime<Utc>,
    pub version: String,
    pub command: String,
}

impl Metadata {
    fn new(command: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            version: OUTPUT_VERSION.to_string(),
            command: command.into(),
        }
    }
}

/// Serialize timestamp in ISO 8601 format
fn serialize_timestamp<S>(dt: &chrono::DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

// ============================================================================
// Response Types
// ============================================================================

/// Response for `breadcrumbs`
#[derive(Debug, Serialize, JsonSchema)]
pub struct BreadcrumbsResponse {
    pub focus: IssueRef,
    pub breadcrumbs: Vec<Breadcrumb>,
}

/// Response for `tree`
#[derive(Debug, Serialize, JsonSchema)]
pub struct TreeResponse {
    pub focus: IssueRef,
    pub max_depth: u8,
    pub nodes: Vec<TreeNode>,
}

/// Response for `list`
#[derive(Debug, Serialize, JsonSchema)]
pub struct IssueListResponse {
    pub issues: Vec<Issue>,
    pub count: usize,
}

/// Response for `validate`
#[derive(Debug, Serialize, JsonSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    pub issues_checked: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ExitCodeDoc {
    code: i32,
    description: &'static str,
}

/// JSON schemas of every `--json` payload, printed by `trellis --schema`.
pub fn output_schema() -> Value {
    let exit_codes: Vec<_> = ExitCode::all()
        .into_iter()
        .map(|code| ExitCodeDoc {
            code: code.code(),
            description: code.description(),
        })
        .collect();

    serde_json::json!({
        "version": OUTPUT_VERSION,
        "outputs": {
            "breadcrumbs": schema_for!(BreadcrumbsResponse),
            "tree": schema_for!(TreeResponse),
            "list": schema_for!(IssueListResponse),
            "show": schema_for!(Issue),
            "validate": schema_for!(ValidateResponse),
        },
        "exit_codes": exit_codes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::IssueType;

    fn node(key: &str, id: &str, level: u8) -> TreeNode {
        TreeNode::new(
            Issue::new(key, IssueType::Story, format!("{} summary", key)).with_id(id),
            level,
        )
    }

    #[test]
    fn test_render_breadcrumbs() {
        let trail: Vec<Breadcrumb> = serde_json::from_value(serde_json::json!([
            {"label": "Demo Project", "path": "/project/proj-1"},
            {"label": "POW-1", "path": "/issue/POW-1"},
            {"label": "POW-5", "path": null}
        ]))
        .unwrap();
        assert_eq!(render_breadcrumbs(&trail), "Demo Project › POW-1 › POW-5");
    }

    #[test]
    fn test_render_tree_indents_by_level_and_marks_focus() {
        let nodes = vec![node("POW-7", "a", 1), node("POW-9", "b", 2)];
        let rendered = render_tree(&nodes, &IssueRef::key("POW-9"));
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "    POW-7 [story] POW-7 summary (todo)");
        assert_eq!(lines[1], "    * POW-9 [story] POW-9 summary (todo)");
    }

    #[test]
    fn test_json_output_envelope() {
        let output = JsonOutput::success(serde_json::json!({"n": 1}), "list");
        let value: Value = serde_json::from_str(&output.to_json_string().unwrap()).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["metadata"]["command"], "list");
        assert_eq!(value["metadata"]["version"], OUTPUT_VERSION);
    }

    #[test]
    fn test_json_error_exit_code() {
        let error = JsonError::issue_not_found(&IssueRef::key("POW-404"), "show");
        assert_eq!(error.exit_code(), ExitCode::NotFound);
        let value: Value = serde_json::from_str(&error.to_json_string().unwrap()).unwrap();
        assert_eq!(value["error"]["code"], "ISSUE_NOT_FOUND");
        assert_eq!(value["error"]["details"]["focus"]["value"], "POW-404");
    }

    #[test]
    fn test_error_codes_round_trip_exit_codes() {
        for code in ExitCode::all() {
            if code == ExitCode::Success || code == ExitCode::GenericError {
                continue;
            }
            assert_eq!(ErrorCode::to_exit_code(ErrorCode::from_exit_code(code)), code);
        }
    }

    #[test]
    fn test_output_schema_lists_payloads() {
        let schema = output_schema();
        assert!(schema["outputs"]["breadcrumbs"].is_object());
        assert!(schema["outputs"]["tree"].is_object());
        assert_eq!(schema["exit_codes"].as_array().unwrap().len(), 5);
        assert_eq!(schema["exit_codes"][3]["code"], 3);
        assert_eq!(
            schema["exit_codes"][3]["description"],
            ExitCode::NotFound.description()
        );
    }
}
