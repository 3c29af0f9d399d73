//! Command-line interface definitions using clap.

use crate::domain::{DomainError, IssueFilter, IssueRef};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Trellis issue hierarchy resolver
///
/// Resolves breadcrumbs and hierarchy trees (epic → story/task/bug → subtask)
/// against a local data directory or a remote issue API.
///
/// Exit Codes:
///   0  - Command succeeded
///   1  - Generic error occurred
///   2  - Invalid arguments or usage error
///   3  - Resource not found (issue, project, data directory)
///  10  - Issue store failed (transport, status, decode)
#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Issue hierarchy resolver", long_about = None)]
pub struct Cli {
    /// Suppress non-essential output (for scripting)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Read issues from a remote API instead of the data directory
    #[arg(long, global = true, value_name = "URL")]
    pub remote: Option<String>,

    /// Data directory (default: .trellis)
    #[arg(long, global = true, env = "TRELLIS_DATA_DIR", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Export the JSON schema of command output
    #[arg(long)]
    pub schema: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the data directory
    Init {
        /// Load the built-in demo project
        #[arg(long)]
        demo: bool,
    },

    /// Import projects and issues from a JSON file
    ///
    /// The file holds `{"projects": [...], "issues": [...]}` with issues in
    /// the API wire format (camelCase, `type`, `epicId`/`epicLink`/`epicKey`).
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Show one issue
    Show(FocusArgs),

    /// List issues matching all given filters
    List(ListArgs),

    /// Print the breadcrumb trail from the root ancestor to an issue
    Breadcrumbs(FocusArgs),

    /// Print the hierarchy around an issue, indented by level
    Tree {
        #[command(flatten)]
        focus: FocusArgs,

        /// Generations shown from the focus downwards (1-3, default from config)
        #[arg(long)]
        depth: Option<u8>,
    },

    /// Check every issue against the hierarchy rules
    Validate,
}

impl Commands {
    /// Command name reported in JSON metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Init { .. } => "init",
            Commands::Import { .. } => "import",
            Commands::Show(_) => "show",
            Commands::List(_) => "list",
            Commands::Breadcrumbs(_) => "breadcrumbs",
            Commands::Tree { .. } => "tree",
            Commands::Validate => "validate",
        }
    }
}

/// Focus issue selection: exactly one of `--id` or `--key`.
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct FocusArgs {
    /// Issue id
    #[arg(long)]
    pub id: Option<String>,

    /// Issue key (e.g. POW-5)
    #[arg(long)]
    pub key: Option<String>,
}

impl FocusArgs {
    /// Build the explicit reference, validating the key format.
    pub fn to_ref(&self) -> Result<IssueRef, DomainError> {
        match (&self.id, &self.key) {
            (Some(id), _) if id.trim().is_empty() => Err(DomainError::EmptyReference),
            (Some(id), _) => Ok(IssueRef::id(id.trim())),
            (None, Some(key)) => IssueRef::parse_key(key),
            (None, None) => Err(DomainError::EmptyReference),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Project id
    #[arg(long)]
    pub project: Option<String>,

    /// Epic id
    #[arg(long)]
    pub epic: Option<String>,

    /// Epic key, for key-linked issues
    #[arg(long)]
    pub epic_key: Option<String>,

    /// Parent issue id
    #[arg(long)]
    pub parent: Option<String>,
}

impl From<ListArgs> for IssueFilter {
    fn from(args: ListArgs) -> Self {
        IssueFilter {
            project_id: args.project,
            epic_id: args.epic,
            epic_key: args.epic_key,
            parent_id: args.parent,
        }
    }
}
