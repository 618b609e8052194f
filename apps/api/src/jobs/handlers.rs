use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::info;

use super::service::{
    self, BatchScoreRequest, BatchScoreResponse, ForceSaveRequest, ScrapeRequest, ScrapeResponse,
};
use crate::errors::AppError;
use crate::export::{CSV_CONTENT_TYPE, CSV_FILENAME};
use crate::models::job::JobRecord;
use crate::state::AppState;
use crate::store::{self, StoreError};

#[derive(Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<JobRecord>,
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
) -> Result<Json<JobListResponse>, AppError> {
    let jobs = store::load_jobs(state.store.as_ref()).await?;
    Ok(Json(JobListResponse {
        count: jobs.len(),
        jobs,
    }))
}

/// DELETE /api/v1/jobs
pub async fn handle_clear_jobs(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    store::clear_jobs(state.store.as_ref()).await?;
    info!("cleared all saved jobs");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/jobs/:index
pub async fn handle_remove_job(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Json<JobRecord>, AppError> {
    let removed = store::remove_job(state.store.as_ref(), index)
        .await
        .map_err(|e| match e {
            StoreError::IndexOutOfRange(i) => AppError::NotFound(format!("no saved job at index {i}")),
            other => AppError::Store(other),
        })?;
    info!(index, url = %removed.url, "removed saved job");
    Ok(Json(removed))
}

/// POST /api/v1/jobs/scrape
pub async fn handle_scrape(
    State(state): State<AppState>,
    Json(req): Json<ScrapeRequest>,
) -> Result<Json<ScrapeResponse>, AppError> {
    Ok(Json(service::scrape(&state, req).await?))
}

/// POST /api/v1/jobs
pub async fn handle_force_save(
    State(state): State<AppState>,
    Json(req): Json<ForceSaveRequest>,
) -> Result<Json<ScrapeResponse>, AppError> {
    Ok(Json(service::force_save(&state, req).await?))
}

/// POST /api/v1/jobs/score
pub async fn handle_score(
    State(state): State<AppState>,
    Json(req): Json<BatchScoreRequest>,
) -> Result<Json<BatchScoreResponse>, AppError> {
    Ok(Json(service::score(&state, req).await?))
}

/// GET /api/v1/jobs/export
pub async fn handle_export(State(state): State<AppState>) -> Result<Response, AppError> {
    let kv = state.store.as_ref();
    let settings = store::load_settings(kv).await?;
    let csv = service::export_store(kv, &settings.scoring_settings).await?;
    Ok((
        [
            (header::CONTENT_TYPE, CSV_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{CSV_FILENAME}\""),
            ),
        ],
        csv,
    )
        .into_response())
}
