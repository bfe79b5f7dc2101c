//! Execution inspection and the status API over HTTP.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use cronrelay_protocols::fields::execution as ef;
use cronrelay_protocols::{ExecutionState, ExecutionStatus, Filter, JobExecution};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionQuery {
    pub job_id: Option<String>,
    pub state: Option<String>,
}

/// GET /executions?jobId=&state=
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExecutionQuery>,
) -> Result<Json<Vec<JobExecution>>, ApiError> {
    let mut filter = Filter::new();
    if let Some(job_id) = &query.job_id {
        filter = filter.eq(ef::JOB_ID, job_id.as_str());
    }
    if let Some(raw) = &query.state {
        let parsed = ExecutionState::parse(raw)
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown execution state: {}", raw)))?;
        filter = filter.eq(ef::STATE, parsed);
    }
    Ok(Json(state.stores.executions.find(&filter).await?))
}

/// GET /executions/{execution_id}
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
) -> Result<Json<JobExecution>, ApiError> {
    state
        .stores
        .executions
        .find_by_id(&execution_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Execution not found: {}", execution_id)))
}

fn ok() -> Json<Value> {
    Json(json!({ "message": "ok" }))
}

/// POST /executions/{execution_id}/heartbeat
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    state
        .status
        .heartbeat(&execution_id, body.map(|Json(v)| v))
        .await?;
    Ok(ok())
}

/// POST /executions/{execution_id}/done
pub async fn done(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    state.status.done(&execution_id, body.map(|Json(v)| v)).await?;
    Ok(ok())
}

/// POST /executions/{execution_id}/fail
pub async fn fail(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    state.status.fail(&execution_id, body.map(|Json(v)| v)).await?;
    Ok(ok())
}

/// POST /executions/{execution_id}/skip
pub async fn skip(
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<String>,
    body: Option<Json<Value>>,
) -> Result<Json<Value>, ApiError> {
    state.status.skip(&execution_id, body.map(|Json(v)| v)).await?;
    Ok(ok())
}
