//! Runtime control of the local leader gate.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MasterRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

fn reason_of(body: Option<Json<MasterRequest>>) -> String {
    body.and_then(|Json(r)| r.reason)
        .unwrap_or_else(|| "requested over HTTP".to_string())
}

/// POST /master/enable
pub async fn enable(
    State(state): State<Arc<AppState>>,
    body: Option<Json<MasterRequest>>,
) -> Json<Value> {
    let changed = state.gate.enable(&reason_of(body)).await;
    Json(json!({ "leader": state.gate.is_enabled(), "changed": changed }))
}

/// POST /master/disable
pub async fn disable(
    State(state): State<Arc<AppState>>,
    body: Option<Json<MasterRequest>>,
) -> Json<Value> {
    let changed = state.gate.disable(&reason_of(body)).await;
    Json(json!({ "leader": state.gate.is_enabled(), "changed": changed }))
}
