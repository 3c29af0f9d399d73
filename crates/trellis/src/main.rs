//! Trellis issue hierarchy resolver
//!
//! Prints breadcrumb trails and hierarchy trees for issues held in a local
//! data directory or behind the REST issue API.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::env;
use tracing_subscriber::EnvFilter;
use trellis::cli::{Cli, Commands};
use trellis::commands::{self, CommandExecutor};
use trellis::config::{TrellisConfig, DEFAULT_DATA_DIR};
use trellis::domain::{DomainError, IssueFilter};
use trellis::errors::{self, ActionableError};
use trellis::hierarchy::ResolveError;
use trellis::output::{
    output_schema, render_breadcrumbs, render_issue, render_issue_list, render_tree,
    BreadcrumbsResponse, ErrorCode, ExitCode, IssueListResponse, JsonError, JsonOutput,
    OutputContext, TreeResponse, ValidateResponse,
};
use trellis::storage::{HttpIssueStore, IssueStore, JsonFileStorage, StoreError};
use trellis::type_hierarchy::{ConfigError, HierarchySettings};

const DEFAULT_LOG_FILTER: &str = "warn";

/// Helper to determine exit code from error
///
/// Walks the cause chain so context added with `anyhow::Context` does not
/// hide the typed error underneath.
fn error_to_exit_code(error: &anyhow::Error) -> ExitCode {
    error
        .chain()
        .find_map(classify)
        .unwrap_or(ExitCode::GenericError)
}

fn classify(cause: &(dyn std::error::Error + 'static)) -> Option<ExitCode> {
    if let Some(e) = cause.downcast_ref::<ResolveError>() {
        return Some(match e {
            ResolveError::FocusNotFound(_) => ExitCode::NotFound,
            ResolveError::Store { .. } => ExitCode::ExternalError,
        });
    }
    if let Some(e) = cause.downcast_ref::<StoreError>() {
        return Some(if e.is_not_found() {
            ExitCode::NotFound
        } else {
            ExitCode::ExternalError
        });
    }
    if cause.is::<DomainError>()
        || cause.is::<ConfigError>()
        || cause.is::<serde_json::Error>()
        || cause.is::<toml::de::Error>()
    {
        return Some(ExitCode::InvalidArgument);
    }
    None
}

/// Remediation hints for the failures users commonly hit.
fn explain(error: &anyhow::Error) -> Option<ActionableError> {
    if let Some(actionable) = error.downcast_ref::<ActionableError>() {
        return Some(actionable.clone());
    }
    if let Some(DomainError::InvalidKey(raw)) = error.downcast_ref::<DomainError>() {
        return Some(errors::invalid_key(raw));
    }
    match error.downcast_ref::<ResolveError>()? {
        ResolveError::FocusNotFound(reference) => Some(errors::issue_not_found(reference)),
        ResolveError::Store { reference, source } => {
            Some(errors::store_unreachable(&source.to_string(), reference))
        }
    }
}

fn report_error(error: &anyhow::Error, output: &OutputContext, command: &str, code: ExitCode) {
    let actionable = explain(error);

    if output.is_json() {
        let message = actionable
            .as_ref()
            .map(|a| a.message().to_string())
            .unwrap_or_else(|| format!("{:#}", error));
        let mut json_error = match error.downcast_ref::<ResolveError>() {
            Some(ResolveError::FocusNotFound(reference)) => {
                JsonError::issue_not_found(reference, command)
            }
            _ => JsonError::new(ErrorCode::from_exit_code(code), message, command),
        };
        for remedy in actionable.iter().flat_map(|a| a.remedies()) {
            json_error = json_error.with_suggestion(remedy.clone());
        }
        match json_error.to_json_string() {
            Ok(json) => println!("{}", json),
            Err(_) => eprintln!("Error: {:#}", error),
        }
        return;
    }

    match actionable {
        Some(actionable) => eprint!("{}", actionable),
        None => eprintln!("Error: {:#}", error),
    }
}

fn init_logging(configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured.unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = OutputContext::new(cli.quiet, cli.json);
    let command = cli.command.as_ref().map(Commands::name).unwrap_or("trellis");

    let exit_code = match run(cli, &output).await {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            let code = error_to_exit_code(&e);
            report_error(&e, &output, command, code);
            code
        }
    };

    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.code());
    }
}

async fn run(cli: Cli, output: &OutputContext) -> Result<()> {
    // Handle --schema flag first
    if cli.schema {
        println!("{}", serde_json::to_string_pretty(&output_schema())?);
        return Ok(());
    }

    let command = cli
        .command
        .ok_or_else(|| anyhow!("No command provided. Use --help for usage."))?;

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => env::current_dir()?.join(DEFAULT_DATA_DIR),
    };
    let config = TrellisConfig::load_with_env(&data_dir)?;
    init_logging(config.log_filter());

    let storage = JsonFileStorage::new(&data_dir);

    match command {
        Commands::Init { demo } => {
            let imported = commands::init(&storage, demo).await?;
            if output.is_json() {
                let data = serde_json::json!({
                    "data_dir": data_dir.display().to_string(),
                    "imported": imported,
                });
                output.print_json(&JsonOutput::success(data, "init"))?;
            } else {
                output.print_info(format!("Initialized trellis in {}", data_dir.display()))?;
                if demo {
                    output.print_info(format!("Loaded demo project ({} issues)", imported))?;
                }
            }
            Ok(())
        }
        Commands::Import { file } => {
            let imported = commands::import_file(&storage, &file).await?;
            output.print_json(&JsonOutput::success(
                serde_json::json!({ "imported": imported }),
                "import",
            ))?;
            output.print_info(format!("Imported {} issues", imported))?;
            Ok(())
        }
        query => {
            let settings = match &query {
                Commands::Tree {
                    depth: Some(depth), ..
                } => HierarchySettings::new(*depth)?,
                _ => config.hierarchy_settings()?,
            };

            match cli.remote.as_deref().or(config.remote_url()) {
                Some(url) => {
                    let store = HttpIssueStore::new(url, config.session(), config.timeout())?;
                    tracing::debug!(base_url = %store.base_url(), "using remote issue store");
                    run_query(CommandExecutor::with_settings(store, settings), query, output).await
                }
                None => {
                    storage.validate().await.with_context(|| {
                        errors::not_initialized(&data_dir.display().to_string())
                    })?;
                    run_query(CommandExecutor::with_settings(storage, settings), query, output)
                        .await
                }
            }
        }
    }
}

async fn run_query<S: IssueStore>(
    executor: CommandExecutor<S>,
    command: Commands,
    output: &OutputContext,
) -> Result<()> {
    match command {
        Commands::Show(args) => {
            let focus = args.to_ref()?;
            let issue = executor.show(&focus).await?;
            output.print_json(&JsonOutput::success(&issue, "show"))?;
            output.print_data(render_issue(&issue))?;
        }
        Commands::List(args) => {
            let filter = IssueFilter::from(args);
            let issues = executor.list(&filter).await?;
            if issues.is_empty() {
                output.print_info("No issues found")?;
            } else {
                output.print_data(render_issue_list(&issues))?;
            }
            let count = issues.len();
            output.print_json(&JsonOutput::success(
                IssueListResponse { issues, count },
                "list",
            ))?;
        }
        Commands::Breadcrumbs(args) => {
            let focus = args.to_ref()?;
            let breadcrumbs = executor.breadcrumbs(&focus).await?;
            output.print_data(render_breadcrumbs(&breadcrumbs))?;
            output.print_json(&JsonOutput::success(
                BreadcrumbsResponse { focus, breadcrumbs },
                "breadcrumbs",
            ))?;
        }
        Commands::Tree { focus, .. } => {
            let focus = focus.to_ref()?;
            let nodes = executor.tree(&focus).await?;
            output.print_data(render_tree(&nodes, &focus))?;
            output.print_json(&JsonOutput::success(
                TreeResponse {
                    focus,
                    max_depth: executor.settings().max_depth(),
                    nodes,
                },
                "tree",
            ))?;
        }
        Commands::Validate => {
            let report = executor.validate().await?;
            for warning in &report.warnings {
                output.print_warning(warning)?;
            }
            output.print_info(format!(
                "Checked {} issues: {} warnings",
                report.issues_checked,
                report.warnings.len()
            ))?;
            output.print_json(&JsonOutput::success(
                ValidateResponse {
                    valid: report.is_valid(),
                    issues_checked: report.issues_checked,
                    warnings: report.warnings.iter().map(ToString::to_string).collect(),
                },
                "validate",
            ))?;
        }
        Commands::Init { .. } | Commands::Import { .. } => {
            return Err(anyhow!("init and import run against the local data directory"));
        }
    }
    Ok(())
}
