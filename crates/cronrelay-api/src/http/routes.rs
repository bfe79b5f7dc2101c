//! HTTP route definitions.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::http::{executions, jobs, master, monitoring, runner};
use crate::state::AppState;

/// Create the router.
///
/// ```text
/// GET    /runJob/{job_id}/{execution_id}   - Runner trigger endpoint
/// POST   /runJobNow/{job_id}               - Fire a job now (leader only)
///
/// POST   /jobs                             - Create job(s)
/// GET    /jobs                             - List jobs
/// GET    /jobs/{id}                        - Get job
/// PUT    /jobs/{id}/enabled                - Enable/disable job
/// DELETE /jobs/{id}                        - Delete job
///
/// GET    /executions?jobId=&state=         - List executions
/// GET    /executions/{id}                  - Get execution
/// POST   /executions/{id}/heartbeat        - Status API
/// POST   /executions/{id}/done
/// POST   /executions/{id}/fail
/// POST   /executions/{id}/skip
///
/// GET    /runners                          - Registered runners
/// POST   /master/enable                    - Acquire local leadership
/// POST   /master/disable                   - Release local leadership
/// GET    /health                           - Health check
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let job_routes = Router::new()
        .route("/", post(jobs::create_jobs).get(jobs::list_jobs))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/enabled", put(jobs::set_enabled));

    let execution_routes = Router::new()
        .route("/", get(executions::list_executions))
        .route("/{id}", get(executions::get_execution))
        .route("/{id}/heartbeat", post(executions::heartbeat))
        .route("/{id}/done", post(executions::done))
        .route("/{id}/fail", post(executions::fail))
        .route("/{id}/skip", post(executions::skip));

    let master_routes = Router::new()
        .route("/enable", post(master::enable))
        .route("/disable", post(master::disable));

    Router::new()
        .route("/runJob/{job_id}/{execution_id}", get(runner::run_job))
        .route("/runJobNow/{job_id}", post(runner::run_job_now))
        .route("/runners", get(monitoring::list_runners))
        .route("/health", get(monitoring::health))
        .nest("/jobs", job_routes)
        .nest("/executions", execution_routes)
        .nest("/master", master_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
