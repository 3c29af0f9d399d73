//! Actionable error formatting for improved user experience.
//!
//! User-facing failures carry:
//! - a clear error description
//! - possible causes (diagnostics)
//! - remediation steps (actionable fixes)

use crate::domain::IssueRef;
use std::fmt;

/// An error with diagnostic context and remediation steps.
///
/// # Example
///
/// ```
/// use trellis::errors::ActionableError;
///
/// let error = ActionableError::new("Issue POW-404 not found")
///     .with_cause("The key may be mistyped")
///     .with_remedy("List issues in the project: trellis list --project proj-1");
///
/// assert!(error.to_string().contains("To fix:"));
/// ```
#[derive(Debug, Clone)]
pub struct ActionableError {
    error: String,
    causes: Vec<String>,
    remediation: Vec<String>,
}

impl ActionableError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            causes: Vec::new(),
            remediation: Vec::new(),
        }
    }

    /// Add a possible cause (diagnostic hint).
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// Add a remediation step (actionable fix).
    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remediation.push(remedy.into());
        self
    }

    /// The bare error description, without causes or remedies.
    pub fn message(&self) -> &str {
        &self.error
    }

    pub fn remedies(&self) -> &[String] {
        &self.remediation
    }

    /// Convert to a formatted error message suitable for display.
    pub fn to_error_message(&self) -> String {
        let mut msg = format!("Error: {}\n", self.error);

        if !self.causes.is_empty() {
            msg.push_str("\nPossible causes:\n");
            for cause in &self.causes {
                msg.push_str(&format!("  • {}\n", cause));
            }
        }

        if !self.remediation.is_empty() {
            msg.push_str("\nTo fix:\n");
            for remedy in &self.remediation {
                msg.push_str(&format!("  • {}\n", remedy));
            }
        }

        msg
    }
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error_message())
    }
}

impl std::error::Error for ActionableError {}

fn lookup_flag(reference: &IssueRef) -> String {
    format!("--{} {}", reference.kind(), reference.value())
}

/// Helper to create focus-not-found errors with standard remediation.
pub fn issue_not_found(reference: &IssueRef) -> ActionableError {
    ActionableError::new(format!("Issue not found: {}", reference))
        .with_cause(format!("No issue has {} '{}'", reference.kind(), reference.value()))
        .with_cause("The issue may have been deleted")
        .with_cause("The data may not have been imported yet")
        .with_remedy("List known issues: trellis list")
        .with_remedy(format!(
            "Look the issue up the other way: trellis show {}",
            match reference {
                IssueRef::Id(_) => "--key <KEY>",
                IssueRef::Key(_) => "--id <ID>",
            }
        ))
}

/// Helper to create remote store failures with standard remediation.
pub fn store_unreachable(detail: &str, reference: &IssueRef) -> ActionableError {
    ActionableError::new(format!("Issue store unavailable: {}", detail))
        .with_cause("The issue API may be down or unreachable")
        .with_cause("The configured base URL may be wrong")
        .with_cause("The API token may be missing or expired")
        .with_remedy("Check [remote] base_url in .trellis/config.toml or TRELLIS_API_URL")
        .with_remedy(format!("Retry: trellis show {}", lookup_flag(reference)))
}

/// Helper to create missing-data-directory errors with standard remediation.
pub fn not_initialized(root: &str) -> ActionableError {
    ActionableError::new(format!("Trellis data not found at {}", root))
        .with_cause("`trellis init` has not been run in this directory")
        .with_cause("TRELLIS_DATA_DIR may point at the wrong directory")
        .with_remedy("Initialize: trellis init")
        .with_remedy("Load sample data: trellis init --demo")
        .with_remedy("Use a remote store instead: trellis --remote http://localhost:3000/api ...")
}

/// Helper to create malformed issue-key errors with standard remediation.
pub fn invalid_key(raw: &str) -> ActionableError {
    ActionableError::new(format!("Invalid issue key: '{}'", raw))
        .with_cause("Issue keys look like <PROJECT>-<NUMBER>, e.g. POW-12")
        .with_remedy("Pass the issue id instead: --id <ID>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actionable_error_formatting() {
        let error = ActionableError::new("Test error")
            .with_cause("First cause")
            .with_cause("Second cause")
            .with_remedy("First remedy")
            .with_remedy("Second remedy");

        let msg = error.to_error_message();

        assert!(msg.contains("Error: Test error"));
        assert!(msg.contains("Possible causes:"));
        assert!(msg.contains("• First cause"));
        assert!(msg.contains("• Second cause"));
        assert!(msg.contains("To fix:"));
        assert!(msg.contains("• Second remedy"));
    }

    #[test]
    fn test_error_without_causes() {
        let msg = ActionableError::new("Simple error")
            .with_remedy("Just fix it")
            .to_error_message();

        assert!(!msg.contains("Possible causes:"));
        assert!(msg.contains("• Just fix it"));
    }

    #[test]
    fn test_issue_not_found_suggests_other_lookup() {
        let msg = issue_not_found(&IssueRef::key("POW-404")).to_error_message();

        assert!(msg.contains("Issue not found: key:POW-404"));
        assert!(msg.contains("trellis show --id <ID>"));
    }

    #[test]
    fn test_store_unreachable_helper() {
        let error = store_unreachable("connection refused", &IssueRef::id("issue-5"));
        assert_eq!(error.message(), "Issue store unavailable: connection refused");
        assert!(error.to_string().contains("trellis show --id issue-5"));
    }

    #[test]
    fn test_not_initialized_helper() {
        let msg = not_initialized(".trellis").to_error_message();
        assert!(msg.contains("trellis init --demo"));
    }
}
