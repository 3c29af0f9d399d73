//! Trellis REST API Server
//!
//! Serves a trellis data directory (or the built-in demo project) over the
//! issue API consumed by `trellis --remote`.

use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trellis::commands::CommandExecutor;
use trellis::config::{TrellisConfig, DEFAULT_DATA_DIR};
use trellis::demo::demo_dataset;
use trellis::storage::{InMemoryStorage, IssueStore, JsonFileStorage};
use trellis::type_hierarchy::HierarchySettings;
use trellis_server::create_routes;

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[command(name = "trellis-server")]
#[command(about = "REST API for trellis issue hierarchies", long_about = None)]
struct Args {
    /// Data directory to serve
    #[arg(long, env = "TRELLIS_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value_t = 3000)]
    port: u16,

    /// Serve the built-in demo project from memory instead of the data directory
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TrellisConfig::load_with_env(&args.data_dir)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_filter().unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Starting trellis API server...");
    let settings = config.hierarchy_settings()?;

    if args.demo {
        info!("Serving the demo project from memory");
        let storage = InMemoryStorage::from_dataset(demo_dataset());
        return serve(storage, settings, &args).await;
    }

    let storage = JsonFileStorage::new(&args.data_dir);

    // Validate the data directory exists
    storage.validate().await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to initialize storage: {}\n\n\
             The server requires an initialized trellis data directory.\n\
             Run 'trellis init' (or 'trellis init --demo'), set TRELLIS_DATA_DIR, or start with --demo.",
            e
        )
    })?;

    info!("Using trellis data at: {}", args.data_dir.display());
    serve(storage, settings, &args).await
}

async fn serve<S: IssueStore + 'static>(
    storage: S,
    settings: HierarchySettings,
    args: &Args,
) -> Result<()> {
    let executor = Arc::new(CommandExecutor::with_settings(storage, settings));

    // Build CORS layer for local development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", create_routes(executor))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}/api", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
