//! Periodic recovery sweeps.
//!
//! Sweep A re-dispatches or fails executions whose liveness signal went
//! quiet. Sweep B catches up on cron fires that were predicted but never
//! happened (for instance while scheduling was disabled).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cronrelay_protocols::fields::execution as ef;
use cronrelay_protocols::{
    ExecutionState, ExecutionType, Filter, Job, JobExecution, LeaderGate, Patch, RecordStore,
};

use crate::dispatcher::Dispatcher;
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::{REASON_MISSED_HEARTBEAT, REASON_NO_HEARTBEAT};

pub struct DefunctMonitor {
    jobs: Arc<dyn RecordStore<Job>>,
    executions: Arc<dyn RecordStore<JobExecution>>,
    dispatcher: Arc<Dispatcher>,
    gate: Arc<dyn LeaderGate>,
    lock_name: String,
    scheduling_enabled: bool,
    /// Age of `lastUpdateTime` beyond which an execution is stalled.
    tolerance: Duration,
    /// How far past its predicted time a cron fire counts as missed.
    grace: Duration,
    events: EventBus,
}

/// Guard for acting on a stalled execution seen by a scan. Any write since
/// the scan (a heartbeat, a status call) voids it.
fn stall_guard(exec: &JobExecution, cutoff: DateTime<Utc>) -> Filter {
    Filter::new()
        .eq(ef::STATE, exec.state)
        .eq(ef::RETRY_COUNT, exec.retry_count)
        .lt_time(ef::LAST_UPDATE_TIME, cutoff)
}

fn stall_failure(now: DateTime<Utc>) -> Patch {
    Patch::new()
        .set(ef::STATE, ExecutionState::Failed)
        .set(ef::RETRY_REASON, REASON_NO_HEARTBEAT)
        .set_time(ef::FAIL_TIME, now)
        .set_time(ef::LAST_UPDATE_TIME, now)
}

fn cutoff(age: Duration) -> DateTime<Utc> {
    let age = chrono::Duration::from_std(age).unwrap_or(chrono::Duration::MAX);
    Utc::now()
        .checked_sub_signed(age)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl DefunctMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn RecordStore<Job>>,
        executions: Arc<dyn RecordStore<JobExecution>>,
        dispatcher: Arc<Dispatcher>,
        gate: Arc<dyn LeaderGate>,
        lock_name: impl Into<String>,
        scheduling_enabled: bool,
        tolerance: Duration,
        grace: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            jobs,
            executions,
            dispatcher,
            gate,
            lock_name: lock_name.into(),
            scheduling_enabled,
            tolerance,
            grace,
            events,
        }
    }

    /// Sweep A. Returns the number of executions acted on.
    ///
    /// Retries run in the background; the sweep itself only waits for the
    /// FAILED writes.
    pub async fn sweep_stalled(&self) -> Result<usize, SchedulerError> {
        let cutoff = cutoff(self.tolerance);
        let stalled = self
            .executions
            .find(
                &Filter::new()
                    .not_in(ef::STATE, ExecutionState::TERMINAL)
                    .lt_time(ef::LAST_UPDATE_TIME, cutoff),
            )
            .await?;

        let mut handled = 0;
        for exec in stalled {
            let guard = stall_guard(&exec, cutoff);

            if exec.retry_enabled {
                warn!(
                    "Execution {} of job {} stalled in {}, retrying",
                    exec.exec_id, exec.job_id, exec.state
                );
                let dispatcher = self.dispatcher.clone();
                tokio::spawn(async move {
                    let id = exec.execution_id.clone();
                    if let Err(e) = dispatcher.retry(exec, REASON_MISSED_HEARTBEAT, guard).await {
                        error!("Retry of stalled execution {} failed: {}", id, e);
                    }
                });
                handled += 1;
                continue;
            }

            if let Some(failed) = self
                .executions
                .update_where(&exec.execution_id, &guard, stall_failure(Utc::now()))
                .await?
            {
                warn!(
                    "Execution {} of job {} stalled with retry disabled, marked FAILED",
                    failed.exec_id, failed.job_id
                );
                self.events.emit(SchedulerEvent::ExecutionMarked {
                    execution_id: failed.execution_id,
                    job_id: failed.job_id,
                    state: ExecutionState::Failed,
                });
                handled += 1;
            }
        }
        Ok(handled)
    }

    fn may_catch_up(&self) -> bool {
        self.scheduling_enabled && self.gate.is_leader(&self.lock_name)
    }

    /// Sweep B. Returns the number of MISSED executions launched.
    pub async fn sweep_missed(&self) -> Result<usize, SchedulerError> {
        if !self.may_catch_up() {
            debug!("Skipping missed-trigger sweep: not leading or scheduling disabled");
            return Ok(0);
        }

        let overdue = self
            .executions
            .find(&Filter::new().lt_time(ef::NEXT_TRIGGER_TIME, cutoff(self.grace)))
            .await?;

        let mut launched = 0;
        for exec in overdue {
            let Some(predicted) = exec.next_trigger_time else {
                continue;
            };
            // Claim the prediction so no other pass acts on it again.
            let claimed = self
                .executions
                .update_where(
                    &exec.execution_id,
                    &Filter::new().eq(ef::NEXT_TRIGGER_TIME, predicted.timestamp_millis()),
                    Patch::new().set_null(ef::NEXT_TRIGGER_TIME),
                )
                .await?;
            if claimed.is_none() {
                continue;
            }

            let Some(job) = self.jobs.find_by_id(&exec.job_id).await? else {
                warn!("Missed fire of deleted job {} dropped", exec.job_id);
                continue;
            };
            if !job.enabled {
                debug!("Missed fire of disabled job {} dropped", job.job_id);
                continue;
            }

            let missed = self
                .dispatcher
                .launch(&job, ExecutionType::Missed, None)
                .await?;
            info!(
                "Job {} missed its fire at {}, launched execution {}",
                job.job_id, predicted, missed.exec_id
            );
            self.events.emit(SchedulerEvent::MissedJobExecuted {
                job_id: job.job_id.clone(),
                missed_execution_id: exec.execution_id.clone(),
                execution_id: missed.execution_id,
            });
            launched += 1;
        }
        Ok(launched)
    }

    /// Run both sweeps every `interval` until cancelled.
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_stalled().await {
                        error!("Stalled-execution sweep failed: {}", e);
                    }
                    if let Err(e) = self.sweep_missed().await {
                        error!("Missed-trigger sweep failed: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "defunct_monitor_tests.rs"]
mod tests;
