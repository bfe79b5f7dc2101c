//! Runner and run-now endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use tracing::info;

use cronrelay_scheduler::RunJobAck;

use crate::error::ApiError;
use crate::state::AppState;

/// Start the handler for a triggered execution.
///
/// GET /runJob/{job_id}/{execution_id}
///
/// A 200 only acknowledges dispatch. Any other status makes the master retry.
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    Path((job_id, execution_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let body = match state.endpoint.run_job(&job_id, &execution_id).await? {
        RunJobAck::Started => json!({ "message": "Job Started" }),
        RunJobAck::Ignored(reason) => json!({ "message": "Job Ignored", "reason": reason }),
    };
    Ok(Json(body))
}

/// Fire a job immediately. The optional body overrides parameter keys.
///
/// POST /runJobNow/{job_id}
pub async fn run_job_now(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let parameter = body.map(|Json(v)| v);
    info!("Run-now requested for job {}", job_id);

    let exec = state
        .scheduler
        .execute_job_now(&job_id, parameter.as_ref())
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "executionID": exec.execution_id,
            "execID": exec.exec_id,
            "jobID": exec.job_id,
        })),
    ))
}
