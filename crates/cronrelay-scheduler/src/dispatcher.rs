//! Execution dispatch: runner selection, trigger call and bounded retry.
//!
//! Every write is conditional on the execution still being in the state this
//! dispatcher last observed, so a concurrent heartbeat, status call or sweep
//! always wins over a late dispatch step. Writes are also skipped once the
//! owning token is cancelled (leadership lost).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cronrelay_protocols::fields::execution as ef;
use cronrelay_protocols::{
    ExecutionState, ExecutionType, Filter, Job, JobExecution, JobRunner, Patch, RecordStore,
};

use crate::REASON_MAX_RETRY;
use crate::armed::ArmedTriggers;
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::runner_registry::RunnerRegistry;

/// How a dispatch attempt sequence ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A runner acknowledged the trigger.
    Triggered(JobExecution),
    /// Retries exhausted; the record is FAILED.
    Failed(JobExecution),
    /// Another writer moved the execution on; nothing was written.
    Superseded(String),
    /// The owning token was cancelled before the next write.
    Aborted(String),
}

enum RetryStep {
    Retrying(JobExecution),
    Exhausted(JobExecution),
    Superseded,
}

pub struct Dispatcher {
    executions: Arc<dyn RecordStore<JobExecution>>,
    registry: Arc<RunnerRegistry>,
    armed: Arc<ArmedTriggers>,
    http: reqwest::Client,
    retry_delay: Duration,
    active: CancellationToken,
    events: EventBus,
}

impl Dispatcher {
    pub fn new(
        executions: Arc<dyn RecordStore<JobExecution>>,
        registry: Arc<RunnerRegistry>,
        armed: Arc<ArmedTriggers>,
        http: reqwest::Client,
        retry_delay: Duration,
        active: CancellationToken,
        events: EventBus,
    ) -> Self {
        Self {
            executions,
            registry,
            armed,
            http,
            retry_delay,
            active,
            events,
        }
    }

    pub fn registry(&self) -> &Arc<RunnerRegistry> {
        &self.registry
    }

    /// Create a CREATED execution of `job` and dispatch it in the background.
    ///
    /// The record is stored before dispatch starts.
    pub async fn launch(
        self: &Arc<Self>,
        job: &Job,
        execution_type: ExecutionType,
        parameter_override: Option<&Value>,
    ) -> Result<JobExecution, SchedulerError> {
        let exec = JobExecution::new(job, execution_type, parameter_override);
        let exec = self.executions.create(exec).await?;
        info!(
            "Created {} execution {} of job {}",
            exec.execution_type, exec.exec_id, exec.job_id
        );
        self.events.emit(SchedulerEvent::ExecutionCreated {
            execution_id: exec.execution_id.clone(),
            job_id: exec.job_id.clone(),
            execution_type: exec.execution_type,
        });

        self.spawn_dispatch(exec.clone());
        Ok(exec)
    }

    pub fn spawn_dispatch(self: &Arc<Self>, exec: JobExecution) {
        let this = self.clone();
        tokio::spawn(async move {
            let id = exec.execution_id.clone();
            if let Err(e) = this.dispatch(exec).await {
                error!("Dispatch of execution {} aborted: {}", id, e);
            }
        });
    }

    /// Trigger `exec` on a runner, retrying on failure.
    pub async fn dispatch(&self, exec: JobExecution) -> Result<DispatchOutcome, SchedulerError> {
        self.drive(exec, None).await
    }

    /// Record a failed attempt for `exec` and continue dispatching it.
    ///
    /// `guard` must match the stored record for the retry to be recorded.
    pub async fn retry(
        &self,
        exec: JobExecution,
        reason: &str,
        guard: Filter,
    ) -> Result<DispatchOutcome, SchedulerError> {
        self.drive(exec, Some((reason.to_string(), guard))).await
    }

    async fn drive(
        &self,
        mut exec: JobExecution,
        mut pending: Option<(String, Filter)>,
    ) -> Result<DispatchOutcome, SchedulerError> {
        loop {
            if let Some((reason, guard)) = pending.take() {
                if self.active.is_cancelled() {
                    return Ok(DispatchOutcome::Aborted(exec.execution_id));
                }
                match self.retry_job(&exec, &reason, guard).await? {
                    RetryStep::Retrying(next) => exec = next,
                    RetryStep::Exhausted(failed) => return Ok(DispatchOutcome::Failed(failed)),
                    RetryStep::Superseded => {
                        return Ok(DispatchOutcome::Superseded(exec.execution_id));
                    }
                }

                tokio::select! {
                    _ = self.active.cancelled() => {
                        return Ok(DispatchOutcome::Aborted(exec.execution_id));
                    }
                    _ = tokio::time::sleep(self.retry_delay) => {}
                }
            }

            if self.active.is_cancelled() {
                return Ok(DispatchOutcome::Aborted(exec.execution_id));
            }

            match self.trigger_remote_job(&exec).await {
                Ok(outcome) => return Ok(outcome),
                Err(SchedulerError::Transport(reason)) => {
                    pending = Some((reason, Self::version_guard(&exec)));
                }
                Err(SchedulerError::NoRunnerAvailable) => {
                    pending = Some((
                        SchedulerError::NoRunnerAvailable.to_string(),
                        Self::version_guard(&exec),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Matches the record only while it is unchanged since `exec` was read.
    fn version_guard(exec: &JobExecution) -> Filter {
        Filter::new()
            .eq(ef::STATE, exec.state)
            .eq(ef::RETRY_COUNT, exec.retry_count)
    }

    /// One trigger attempt against the next runner.
    ///
    /// Transport problems and an empty registry come back as errors for the
    /// retry path. Success updates the record.
    pub async fn trigger_remote_job(
        &self,
        exec: &JobExecution,
    ) -> Result<DispatchOutcome, SchedulerError> {
        let runner = self
            .registry
            .select()
            .await?
            .ok_or(SchedulerError::NoRunnerAvailable)?;

        let url = format!(
            "{}/runJob/{}/{}",
            runner.base_url(),
            exec.job_id,
            exec.execution_id
        );
        debug!("Triggering execution {} on {}", exec.exec_id, url);

        let response = self.http.get(&url).send().await.map_err(|e| {
            SchedulerError::Transport(format!(
                "Failed to reach runner {} at {}: {}",
                runner.instance_id,
                runner.base_url(),
                e
            ))
        })?;

        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SchedulerError::Transport(format!(
                "Runner {} responded with status {}: {}",
                runner.instance_id, status, body
            )));
        }

        if self.active.is_cancelled() {
            return Ok(DispatchOutcome::Aborted(exec.execution_id.clone()));
        }
        self.record_trigger(exec, &runner).await
    }

    async fn record_trigger(
        &self,
        exec: &JobExecution,
        runner: &JobRunner,
    ) -> Result<DispatchOutcome, SchedulerError> {
        let now = Utc::now();
        let mut metadata = Patch::new()
            .set_time(ef::TRIGGER_TIME, now)
            .set(ef::ASSIGNED_RUNNER, &runner.instance_id);
        // Only cron-scheduled firings predict the next slot; any other type
        // would let the missed sweep catch the same slot up twice.
        if exec.execution_type == ExecutionType::Normal {
            if let Some(next) = self.armed.next_tracked_fire(&exec.job_id, now) {
                metadata = metadata.set_time(ef::NEXT_TRIGGER_TIME, next);
            }
        }

        let state = exec.triggered_state();
        let mut transition = metadata.clone();
        transition = transition
            .set(ef::STATE, state)
            .set_time(ef::LAST_UPDATE_TIME, now);
        let guard = Filter::new()
            .is_in(ef::STATE, [ExecutionState::Created, ExecutionState::Retrying])
            .eq(ef::RETRY_COUNT, exec.retry_count);

        let updated = match self
            .executions
            .update_where(&exec.execution_id, &guard, transition)
            .await?
        {
            Some(updated) => updated,
            None => {
                // The runner already reported progress; keep its state.
                match self
                    .executions
                    .update_by_id(&exec.execution_id, metadata)
                    .await?
                {
                    Some(updated) => updated,
                    None => return Ok(DispatchOutcome::Superseded(exec.execution_id.clone())),
                }
            }
        };

        info!(
            "Execution {} of job {} {} on runner {}",
            updated.exec_id, updated.job_id, updated.state, runner.instance_id
        );
        self.events.emit(SchedulerEvent::ExecutionTriggered {
            execution_id: updated.execution_id.clone(),
            job_id: updated.job_id.clone(),
            runner: runner.instance_id.clone(),
            state: updated.state,
        });
        Ok(DispatchOutcome::Triggered(updated))
    }

    /// Count a failed attempt: RETRYING while the bound allows, else FAILED.
    async fn retry_job(
        &self,
        exec: &JobExecution,
        reason: &str,
        guard: Filter,
    ) -> Result<RetryStep, SchedulerError> {
        let now = Utc::now();

        if exec.can_retry() {
            let patch = Patch::new()
                .set(ef::STATE, ExecutionState::Retrying)
                .set(ef::RETRY_COUNT, exec.retry_count + 1)
                .set(ef::RETRY_REASON, reason)
                .set_time(ef::LAST_UPDATE_TIME, now);

            return match self
                .executions
                .update_where(&exec.execution_id, &guard, patch)
                .await?
            {
                Some(updated) => {
                    warn!(
                        "Execution {} of job {} retrying ({}/{}): {}",
                        updated.exec_id,
                        updated.job_id,
                        updated.retry_count,
                        updated.max_retry_count,
                        reason
                    );
                    self.events.emit(SchedulerEvent::ExecutionRetrying {
                        execution_id: updated.execution_id.clone(),
                        job_id: updated.job_id.clone(),
                        retry_count: updated.retry_count,
                        reason: reason.to_string(),
                    });
                    Ok(RetryStep::Retrying(updated))
                }
                None => Ok(RetryStep::Superseded),
            };
        }

        let patch = Patch::new()
            .set(ef::STATE, ExecutionState::Failed)
            .set(ef::RETRY_REASON, REASON_MAX_RETRY)
            .set_time(ef::FAIL_TIME, now)
            .set_time(ef::LAST_UPDATE_TIME, now);

        match self
            .executions
            .update_where(&exec.execution_id, &guard, patch)
            .await?
        {
            Some(failed) => {
                error!(
                    "Execution {} of job {} failed after {} retries, last error: {}",
                    failed.exec_id, failed.job_id, failed.retry_count, reason
                );
                self.events.emit(SchedulerEvent::ExecutionMarked {
                    execution_id: failed.execution_id.clone(),
                    job_id: failed.job_id.clone(),
                    state: ExecutionState::Failed,
                });
                Ok(RetryStep::Exhausted(failed))
            }
            None => Ok(RetryStep::Superseded),
        }
    }
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
