//! Built-in demo dataset.
//!
//! One project with two epics, linked stories, subtasks and a few malformed
//! records (orphaned subtask, key-linked story, dangling parent). Used by
//! `trellis init --demo`, `trellis-server --demo` and the test suites.
//!
//! | Key    | Id        | Type    | Links                        |
//! |--------|-----------|---------|------------------------------|
//! | POW-1  | epic-1    | epic    |                              |
//! | POW-2  | epic-2    | epic    |                              |
//! | POW-3  | issue-3   | task    | epicKey POW-1                |
//! | POW-5  | issue-5   | story   | epicId epic-1                |
//! | POW-6  | issue-6   | subtask | parent issue-5               |
//! | POW-7  | issue-7   | story   |                              |
//! | POW-8  | issue-8   | subtask | parent issue-7               |
//! | POW-9  | issue-9   | subtask | parent issue-7               |
//! | POW-10 | issue-10  | subtask | parent issue-7               |
//! | POW-11 | issue-11  | bug     | epicId epic-1, parent issue-5|
//! | POW-12 | issue-12  | subtask | parent missing-parent        |

use crate::domain::{Dataset, Issue, IssueRef, IssueType, Project};

pub const DEMO_PROJECT_ID: &str = "proj-1";

pub fn demo_dataset() -> Dataset {
    let issue = |key: &str, id: &str, issue_type: IssueType, summary: &str| {
        Issue::new(key, issue_type, summary)
            .with_id(id)
            .with_project(DEMO_PROJECT_ID)
    };

    Dataset {
        projects: vec![Project::new(DEMO_PROJECT_ID, "POW", "Demo Project")],
        issues: vec![
            issue("POW-1", "epic-1", IssueType::Epic, "Account onboarding"),
            issue("POW-2", "epic-2", IssueType::Epic, "Billing revamp"),
            issue("POW-3", "issue-3", IssueType::Task, "Audit signup copy")
                .with_epic(IssueRef::key("POW-1")),
            issue("POW-5", "issue-5", IssueType::Story, "Sign up with email")
                .with_epic(IssueRef::id("epic-1"))
                .with_status("in_progress"),
            issue("POW-6", "issue-6", IssueType::Subtask, "Validate email format")
                .with_parent("issue-5"),
            issue("POW-7", "issue-7", IssueType::Story, "Profile page"),
            issue("POW-8", "issue-8", IssueType::Subtask, "Avatar upload").with_parent("issue-7"),
            issue("POW-9", "issue-9", IssueType::Subtask, "Display name field")
                .with_parent("issue-7"),
            issue("POW-10", "issue-10", IssueType::Subtask, "Timezone picker")
                .with_parent("issue-7"),
            issue("POW-11", "issue-11", IssueType::Bug, "Signup button double-submits")
                .with_epic(IssueRef::id("epic-1"))
                .with_parent("issue-5"),
            issue("POW-12", "issue-12", IssueType::Subtask, "Leftover migration step")
                .with_parent("missing-parent"),
        ],
    }
}
