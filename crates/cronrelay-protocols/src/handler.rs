//! Job handler and status reporting interfaces.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{HandlerError, StatusError};

/// Progress reporting for a running execution.
///
/// Every call carries an optional opaque status payload.
#[async_trait]
pub trait ExecutionStatus: Send + Sync {
    /// Mark the execution RUNNING and reset its staleness clock.
    async fn heartbeat(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError>;

    /// Mark the execution COMPLETED and fire the job's successors.
    async fn done(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError>;

    /// Mark the execution FAILED without consuming retries.
    async fn fail(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError>;

    /// Mark the execution SKIPPED.
    async fn skip(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError>;
}

/// Everything a handler needs to run one execution.
#[derive(Clone)]
pub struct JobContext {
    pub execution_id: String,
    pub job_id: String,
    pub parameter: Value,
    pub status: Arc<dyn ExecutionStatus>,
}

impl JobContext {
    pub async fn heartbeat(&self, status: Option<Value>) -> Result<(), StatusError> {
        self.status.heartbeat(&self.execution_id, status).await
    }

    pub async fn done(&self, status: Option<Value>) -> Result<(), StatusError> {
        self.status.done(&self.execution_id, status).await
    }

    pub async fn fail(&self, status: Option<Value>) -> Result<(), StatusError> {
        self.status.fail(&self.execution_id, status).await
    }

    pub async fn skip(&self, status: Option<Value>) -> Result<(), StatusError> {
        self.status.skip(&self.execution_id, status).await
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("execution_id", &self.execution_id)
            .field("job_id", &self.job_id)
            .field("parameter", &self.parameter)
            .finish_non_exhaustive()
    }
}

/// Business logic bound to a `(mdl, fn)` pair.
///
/// Handlers report their outcome through [`JobContext`]. Returning an error
/// marks a still-active execution FAILED.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn module(&self) -> &str;

    fn function(&self) -> &str;

    async fn run(&self, ctx: JobContext) -> Result<(), HandlerError>;
}
