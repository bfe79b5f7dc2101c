//! Status reporting consumed by running job code.
//!
//! Every call is a conditional write that only applies to a non-terminal
//! execution, so a terminal record is never overwritten and a status call
//! racing a sweep resolves to exactly one winner.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use cronrelay_protocols::fields::execution as ef;
use cronrelay_protocols::{
    ExecutionState, ExecutionStatus, ExecutionType, Filter, Job, JobExecution, Patch,
    RecordStore, StatusError,
};

use crate::dispatcher::Dispatcher;
use crate::events::{EventBus, SchedulerEvent};

pub struct ExecutionStatusApi {
    jobs: Arc<dyn RecordStore<Job>>,
    executions: Arc<dyn RecordStore<JobExecution>>,
    dispatcher: Arc<Dispatcher>,
    events: EventBus,
}

impl ExecutionStatusApi {
    pub fn new(
        jobs: Arc<dyn RecordStore<Job>>,
        executions: Arc<dyn RecordStore<JobExecution>>,
        dispatcher: Arc<Dispatcher>,
        events: EventBus,
    ) -> Self {
        Self {
            jobs,
            executions,
            dispatcher,
            events,
        }
    }

    async fn mark(
        &self,
        execution_id: &str,
        state: ExecutionState,
        status: Option<Value>,
    ) -> Result<JobExecution, StatusError> {
        let now = Utc::now();
        let mut patch = Patch::new()
            .set(ef::STATE, state)
            .set_time(ef::LAST_UPDATE_TIME, now);
        patch = match state {
            ExecutionState::Completed | ExecutionState::Skipped => {
                patch.set_time(ef::COMPLETION_TIME, now)
            }
            ExecutionState::Failed => patch.set_time(ef::FAIL_TIME, now),
            _ => patch,
        };
        if let Some(status) = status {
            patch = patch.set(ef::COMPLETION_STATUS, status);
        }

        let guard = Filter::new().not_in(ef::STATE, ExecutionState::TERMINAL);
        match self.executions.update_where(execution_id, &guard, patch).await? {
            Some(updated) => {
                if state != ExecutionState::Running {
                    info!(
                        "Execution {} of job {} marked {}",
                        updated.exec_id, updated.job_id, state
                    );
                }
                self.events.emit(SchedulerEvent::ExecutionMarked {
                    execution_id: updated.execution_id.clone(),
                    job_id: updated.job_id.clone(),
                    state,
                });
                Ok(updated)
            }
            None => match self.executions.find_by_id(execution_id).await? {
                None => Err(StatusError::ExecutionNotFound(execution_id.to_string())),
                Some(current) => Err(StatusError::NotActive {
                    execution_id: execution_id.to_string(),
                    state: current.state.to_string(),
                }),
            },
        }
    }

    /// Launch a CHAIN execution for each successor of the completed job.
    ///
    /// The completion is already recorded, so a failure on one successor is
    /// logged and the remaining successors still fire.
    async fn fire_successors(&self, completed: &JobExecution) -> Result<usize, StatusError> {
        let Some(job) = self.jobs.find_by_id(&completed.job_id).await? else {
            return Ok(0);
        };

        let mut fired = 0;
        for successor in &job.successors {
            let next = match self.jobs.find_by_id(&successor.job_id).await {
                Ok(Some(next)) => next,
                Ok(None) => {
                    warn!(
                        "Successor {} of job {} does not exist, skipping",
                        successor.job_id, job.job_id
                    );
                    continue;
                }
                Err(e) => {
                    error!(
                        "Could not load successor {} of job {}: {}",
                        successor.job_id, job.job_id, e
                    );
                    continue;
                }
            };
            if !next.enabled {
                warn!("Successor {} of job {} is disabled, skipping", next.job_id, job.job_id);
                continue;
            }

            let exec = match self
                .dispatcher
                .launch(&next, ExecutionType::Chain, Some(&successor.parameter))
                .await
            {
                Ok(exec) => exec,
                Err(e) => {
                    error!("Could not chain job {} after {}: {}", next.job_id, job.job_id, e);
                    continue;
                }
            };
            info!(
                "Job {} completed, chained execution {} of job {}",
                job.job_id, exec.exec_id, next.job_id
            );
            fired += 1;
        }
        Ok(fired)
    }
}

#[async_trait]
impl ExecutionStatus for ExecutionStatusApi {
    #[instrument(skip(self, status))]
    async fn heartbeat(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError> {
        self.mark(execution_id, ExecutionState::Running, status).await?;
        Ok(())
    }

    #[instrument(skip(self, status))]
    async fn done(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError> {
        let completed = self.mark(execution_id, ExecutionState::Completed, status).await?;
        self.fire_successors(&completed).await?;
        Ok(())
    }

    #[instrument(skip(self, status))]
    async fn fail(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError> {
        self.mark(execution_id, ExecutionState::Failed, status).await?;
        Ok(())
    }

    #[instrument(skip(self, status))]
    async fn skip(&self, execution_id: &str, status: Option<Value>) -> Result<(), StatusError> {
        self.mark(execution_id, ExecutionState::Skipped, status).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "status_api_tests.rs"]
mod tests;
