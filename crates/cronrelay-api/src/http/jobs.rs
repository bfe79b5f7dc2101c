//! Job administration.
//!
//! - POST   /jobs               - Create one job or an array of jobs
//! - GET    /jobs               - List jobs
//! - GET    /jobs/{id}          - Get job
//! - PUT    /jobs/{id}/enabled  - Enable or disable a job
//! - DELETE /jobs/{id}          - Delete job

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::info;

use cronrelay_protocols::Job;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /jobs`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JobsPayload {
    Many(Vec<Job>),
    One(Box<Job>),
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
    pub enabled: bool,
}

pub async fn create_jobs(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<JobsPayload>,
) -> Result<(StatusCode, Json<Vec<Job>>), ApiError> {
    let created = match payload {
        JobsPayload::One(job) => vec![state.catalog.create(*job).await?],
        JobsPayload::Many(jobs) => state.catalog.create_many(jobs).await?,
    };
    info!("Created {} job(s)", created.len());
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Job>>, ApiError> {
    Ok(Json(state.catalog.list().await?))
}

pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.catalog.get(&job_id).await?))
}

pub async fn set_enabled(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    Json(request): Json<EnabledRequest>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.catalog.set_enabled(&job_id, request.enabled).await?))
}

pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
