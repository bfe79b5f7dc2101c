//! Health and runner inspection.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use cronrelay_protocols::{Filter, JobRunner};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_seconds: u64,
    pub leader: bool,
    pub scheduler_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
    pub cached_runners: usize,
    pub armed_triggers: usize,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = state.scheduler.status().await;
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime().as_secs(),
        leader: status.leader,
        scheduler_running: status.running,
        runner_id: state.runner_id.clone(),
        cached_runners: status.cached_runners,
        armed_triggers: status.armed_triggers,
    })
}

/// GET /runners
pub async fn list_runners(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<JobRunner>>, ApiError> {
    Ok(Json(state.stores.runners.find(&Filter::new()).await?))
}
