//! API route definitions

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use trellis::commands::CommandExecutor;
use trellis::domain::{Issue, IssueFilter, IssueRef, Project};
use trellis::hierarchy::{HierarchyResolver, ResolveError};
use trellis::output::{BreadcrumbsResponse, TreeResponse};
use trellis::storage::{IssueStore, StoreError};
use trellis::type_hierarchy::HierarchySettings;

/// Shared application state
pub type AppState<S> = Arc<CommandExecutor<S>>;

/// Create API routes
pub fn create_routes<S: IssueStore + 'static>(executor: Arc<CommandExecutor<S>>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/issues", get(list_issues))
        .route("/issues/:id", get(get_issue))
        .route("/issues/key/:key", get(get_issue_by_key))
        .route("/projects/:id", get(get_project))
        .route("/hierarchy/breadcrumbs", get(get_breadcrumbs))
        .route("/hierarchy/tree", get(get_tree))
        .with_state(executor)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "trellis-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn store_status(error: &StoreError) -> StatusCode {
    if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn resolve_status(error: &ResolveError) -> StatusCode {
    match error {
        ResolveError::FocusNotFound(_) => StatusCode::NOT_FOUND,
        ResolveError::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// List issues, filtered by `projectId`, `epicLink` (or `epicId`), `epicKey`
/// and `parentId`
async fn list_issues<S: IssueStore>(
    Query(filter): Query<IssueFilter>,
    State(executor): State<AppState<S>>,
) -> Result<Json<Vec<Issue>>, StatusCode> {
    executor.list(&filter).await.map(Json).map_err(|e| {
        tracing::error!("Failed to list issues: {:?}", e);
        store_status(&e)
    })
}

/// Get single issue by ID
async fn get_issue<S: IssueStore>(
    Path(id): Path<String>,
    State(executor): State<AppState<S>>,
) -> Result<Json<Issue>, StatusCode> {
    executor.store().get_issue_by_id(&id).await.map(Json).map_err(|e| {
        if !e.is_not_found() {
            tracing::error!("Failed to get issue {}: {:?}", id, e);
        }
        store_status(&e)
    })
}

async fn get_issue_by_key<S: IssueStore>(
    Path(key): Path<String>,
    State(executor): State<AppState<S>>,
) -> Result<Json<Issue>, StatusCode> {
    executor
        .store()
        .get_issue_by_key(&key)
        .await
        .map(Json)
        .map_err(|e| {
            if !e.is_not_found() {
                tracing::error!("Failed to get issue {}: {:?}", key, e);
            }
            store_status(&e)
        })
}

async fn get_project<S: IssueStore>(
    Path(id): Path<String>,
    State(executor): State<AppState<S>>,
) -> Result<Json<Project>, StatusCode> {
    executor.store().get_project(&id).await.map(Json).map_err(|e| {
        if !e.is_not_found() {
            tracing::error!("Failed to get project {}: {:?}", id, e);
        }
        store_status(&e)
    })
}

/// Focus selection for hierarchy queries: exactly one of `id` or `key`.
#[derive(Debug, Default, Deserialize)]
pub struct FocusQuery {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    key: Option<String>,
    /// Tree depth override (1-3)
    #[serde(default)]
    depth: Option<u8>,
}

impl FocusQuery {
    fn focus(&self) -> Result<IssueRef, StatusCode> {
        let id = self.id.as_deref().map(str::trim).filter(|v| !v.is_empty());
        let key = self.key.as_deref().map(str::trim).filter(|v| !v.is_empty());
        match (id, key) {
            (Some(id), None) => Ok(IssueRef::id(id)),
            (None, Some(key)) => IssueRef::parse_key(key).map_err(|_| StatusCode::BAD_REQUEST),
            _ => Err(StatusCode::BAD_REQUEST),
        }
    }
}

/// Breadcrumb trail from the root ancestor to the focus
async fn get_breadcrumbs<S: IssueStore>(
    Query(query): Query<FocusQuery>,
    State(executor): State<AppState<S>>,
) -> Result<Json<BreadcrumbsResponse>, StatusCode> {
    let focus = query.focus()?;
    let breadcrumbs = executor.breadcrumbs(&focus).await.map_err(|e| {
        tracing::error!("Failed to resolve breadcrumbs for {}: {}", focus, e);
        resolve_status(&e)
    })?;

    Ok(Json(BreadcrumbsResponse { focus, breadcrumbs }))
}

/// Leveled hierarchy tree around the focus
async fn get_tree<S: IssueStore>(
    Query(query): Query<FocusQuery>,
    State(executor): State<AppState<S>>,
) -> Result<Json<TreeResponse>, StatusCode> {
    let focus = query.focus()?;
    let settings = match query.depth {
        Some(depth) => HierarchySettings::new(depth).map_err(|_| StatusCode::BAD_REQUEST)?,
        None => executor.settings(),
    };

    let resolver = HierarchyResolver::with_settings(executor.store().clone(), settings);
    let nodes = resolver.resolve_tree(&focus).await.map_err(|e| {
        tracing::error!("Failed to resolve tree for {}: {}", focus, e);
        resolve_status(&e)
    })?;

    Ok(Json(TreeResponse {
        focus,
        max_depth: settings.max_depth(),
        nodes,
    }))
}
