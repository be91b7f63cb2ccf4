use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{patch, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::*;
use crate::services::{ReconcileStats, StructureNode};
use crate::state::AppState;

const DEFAULT_ACTOR: &str = "user";

#[derive(Deserialize)]
struct ActorParams {
    #[serde(default)]
    actor: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl ActorParams {
    fn actor(&self) -> &str {
        self.actor.as_deref().unwrap_or(DEFAULT_ACTOR)
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub skipped: bool,
    pub stats: Option<ReconcileStats>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/students/{id}/structure", get(structure_hierarchy))
        .route("/students/{id}/structure/archived", get(list_archived))
        .route("/students/{id}/metadata", get(get_metadata))
        .route("/structure", post(create_structure))
        .route("/structure/{id}", patch(update_structure))
        .route("/structure/{id}/archive", patch(archive_structure))
        .route("/structure/{id}/restore", patch(restore_structure))
        .route("/portfolios/open", post(open_portfolio))
        .route("/sync", post(sync_now))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn structure_hierarchy(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<StructureNode>>, AppError> {
    let tree = state.portfolio.structure_hierarchy(&student_id).await?;
    Ok(Json(tree))
}

async fn list_archived(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<Vec<StructureRecord>>, AppError> {
    let records = state.portfolio.list_archived(&student_id).await?;
    Ok(Json(records))
}

async fn get_metadata(
    State(state): State<AppState>,
    Path(student_id): Path<String>,
) -> Result<Json<PortfolioMetadata>, AppError> {
    let metadata = state.portfolio.metadata(&student_id).await?;
    Ok(Json(metadata))
}

async fn create_structure(
    State(state): State<AppState>,
    Query(params): Query<ActorParams>,
    Json(req): Json<NewStructureRequest>,
) -> Result<(StatusCode, Json<StructureRecord>), AppError> {
    let record = state.portfolio.create(req, params.actor()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStructureRequest>,
) -> Result<Json<StructureRecord>, AppError> {
    let record = state.portfolio.update(&id, req).await?;
    Ok(Json(record))
}

async fn archive_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Result<Json<StructureRecord>, AppError> {
    let record = state
        .portfolio
        .archive(&id, params.actor(), params.reason.as_deref())
        .await?;
    Ok(Json(record))
}

async fn restore_structure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ActorParams>,
) -> Result<Json<StructureRecord>, AppError> {
    let record = state.portfolio.restore(&id, params.actor()).await?;
    Ok(Json(record))
}

async fn open_portfolio(
    State(state): State<AppState>,
    Json(key): Json<PortfolioKey>,
) -> Result<StatusCode, AppError> {
    state.sessions.open(key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_now(
    State(state): State<AppState>,
    Json(key): Json<PortfolioKey>,
) -> Result<Json<SyncResponse>, AppError> {
    // An explicit request always re-checks; the guard still prevents overlap.
    state.reconcile.guard().invalidate(&key);
    let stats = state.reconcile.run_guarded(&key).await?;
    Ok(Json(SyncResponse {
        skipped: stats.is_none(),
        stats,
    }))
}
