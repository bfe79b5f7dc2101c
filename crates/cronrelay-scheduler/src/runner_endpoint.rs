//! Runner-side trigger handling.
//!
//! Resolves the handler of a triggered execution and starts it in the
//! background. The trigger call is acknowledged as soon as the handler is
//! spawned; the handler reports its own outcome through [`ExecutionStatus`].

use std::sync::Arc;

use serde_json::json;
use tracing::{Instrument, error, info, info_span, warn};

use cronrelay_core::HandlerRegistry;
use cronrelay_protocols::{
    ExecutionStatus, JobContext, JobExecution, RecordStore, StatusError,
};

use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};

/// Acknowledgement of a trigger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunJobAck {
    /// The handler was spawned.
    Started,
    /// Nothing to run; the reason is logged and returned.
    Ignored(String),
}

pub struct JobRunnerEndpoint {
    executions: Arc<dyn RecordStore<JobExecution>>,
    handlers: Arc<HandlerRegistry>,
    status: Arc<dyn ExecutionStatus>,
    events: EventBus,
}

impl JobRunnerEndpoint {
    pub fn new(
        executions: Arc<dyn RecordStore<JobExecution>>,
        handlers: Arc<HandlerRegistry>,
        status: Arc<dyn ExecutionStatus>,
        events: EventBus,
    ) -> Self {
        Self {
            executions,
            handlers,
            status,
            events,
        }
    }

    /// Start the handler for `execution_id`.
    ///
    /// Unknown or terminal executions are acknowledged as ignored. A handler
    /// that cannot be resolved is an error so the master retries elsewhere.
    pub async fn run_job(
        &self,
        job_id: &str,
        execution_id: &str,
    ) -> Result<RunJobAck, SchedulerError> {
        let Some(exec) = self.executions.find_by_id(execution_id).await? else {
            let reason = format!("execution {} not found", execution_id);
            warn!("Ignoring trigger for job {}: {}", job_id, reason);
            return Ok(RunJobAck::Ignored(reason));
        };

        if exec.job_id != job_id {
            let reason = format!(
                "execution {} belongs to job {}, not {}",
                execution_id, exec.job_id, job_id
            );
            warn!("Ignoring trigger: {}", reason);
            return Ok(RunJobAck::Ignored(reason));
        }

        if exec.is_terminal() {
            let reason = format!("execution {} is already {}", exec.exec_id, exec.state);
            info!("Ignoring trigger for job {}: {}", job_id, reason);
            return Ok(RunJobAck::Ignored(reason));
        }

        let handler = self
            .handlers
            .resolve(&exec.mdl, &exec.function)
            .ok_or_else(|| SchedulerError::HandlerNotFound(exec.handler_key()))?;

        let ctx = JobContext {
            execution_id: exec.execution_id.clone(),
            job_id: exec.job_id.clone(),
            parameter: exec.parameter.clone(),
            status: self.status.clone(),
        };
        let status = self.status.clone();
        let span = info_span!("job", job_id = %exec.job_id, exec_id = %exec.exec_id);

        tokio::spawn(
            async move {
                let execution_id = ctx.execution_id.clone();
                if let Err(e) = handler.run(ctx).await {
                    error!("Handler failed: {}", e);
                    let payload = json!({ "error": e.to_string() });
                    match status.fail(&execution_id, Some(payload)).await {
                        Ok(()) | Err(StatusError::NotActive { .. }) => {}
                        Err(e) => error!("Could not mark execution failed: {}", e),
                    }
                }
            }
            .instrument(span),
        );

        info!(
            "Started {} for execution {} of job {}",
            exec.handler_key(),
            exec.exec_id,
            exec.job_id
        );
        self.events.emit(SchedulerEvent::HandlerInvoked {
            execution_id: exec.execution_id,
            job_id: exec.job_id,
        });
        Ok(RunJobAck::Started)
    }
}

#[cfg(test)]
#[path = "runner_endpoint_tests.rs"]
mod tests;
