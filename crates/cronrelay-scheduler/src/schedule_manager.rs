//! Activation of job triggers while this instance leads.
//!
//! The first pass of an epoch arms every enabled job regardless of its
//! `scheduled` flag, recovering triggers after a restart or handoff. Later
//! passes only claim jobs whose flag is still unset.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use cronrelay_protocols::fields::{execution as ef, job as jf};
use cronrelay_protocols::{
    ExecutionType, Filter, Job, JobExecution, Patch, RecordStore, StoreError,
};

use crate::armed::ArmedTriggers;
use crate::dispatcher::Dispatcher;
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::triggers::{run_trigger, trigger_for};

pub struct ScheduleManager {
    jobs: Arc<dyn RecordStore<Job>>,
    executions: Arc<dyn RecordStore<JobExecution>>,
    armed: Arc<ArmedTriggers>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
    events: EventBus,
    first_pass: AtomicBool,
}

impl ScheduleManager {
    pub fn new(
        jobs: Arc<dyn RecordStore<Job>>,
        executions: Arc<dyn RecordStore<JobExecution>>,
        armed: Arc<ArmedTriggers>,
        dispatcher: Arc<Dispatcher>,
        cancel: CancellationToken,
        events: EventBus,
    ) -> Self {
        Self {
            jobs,
            executions,
            armed,
            dispatcher,
            cancel,
            events,
            first_pass: AtomicBool::new(true),
        }
    }

    /// One activation pass. Returns the number of newly armed triggers.
    pub async fn schedule_jobs(self: &Arc<Self>) -> Result<usize, SchedulerError> {
        let first = self.first_pass.load(Ordering::SeqCst);
        let filter = if first {
            Filter::new().eq(jf::ENABLED, true)
        } else {
            Filter::new().eq(jf::ENABLED, true).eq(jf::SCHEDULED, false)
        };

        let candidates = self.jobs.find(&filter).await?;
        let mut armed = 0;
        for job in candidates {
            let claimed = if first {
                self.jobs
                    .update_by_id(&job.job_id, Patch::new().set(jf::SCHEDULED, true))
                    .await?
            } else {
                self.jobs
                    .update_where(
                        &job.job_id,
                        &Filter::new().eq(jf::SCHEDULED, false),
                        Patch::new().set(jf::SCHEDULED, true),
                    )
                    .await?
            };

            if let Some(job) = claimed {
                if self.arm(&job) {
                    armed += 1;
                }
            }
        }

        // Only a pass that completed counts as the recovery scan.
        self.first_pass.store(false, Ordering::SeqCst);
        if armed > 0 {
            info!("Schedule pass armed {} trigger(s)", armed);
        }
        Ok(armed)
    }

    /// Arm the trigger of `job`. Returns `false` if already armed, chained
    /// or unarmable.
    fn arm(self: &Arc<Self>, job: &Job) -> bool {
        if self.armed.contains(&job.job_id) {
            debug!("Job {} already armed", job.job_id);
            return false;
        }

        let source = match trigger_for(job) {
            Ok(Some(source)) => source,
            Ok(None) => {
                debug!("Job {} is chained, nothing to arm", job.job_id);
                return false;
            }
            Err(e) => {
                error!("Cannot arm job {}: {}", job.job_id, e);
                return false;
            }
        };

        let cancel = self.cancel.child_token();
        if !self.armed.insert(&job.job_id, source.clone(), cancel.clone()) {
            return false;
        }

        info!("Armed {} trigger for job {}", source.kind(), job.job_id);
        self.events.emit(SchedulerEvent::JobScheduled {
            job_id: job.job_id.clone(),
            kind: source.kind().to_string(),
        });

        let this = self.clone();
        let job_id = job.job_id.clone();
        tokio::spawn(async move {
            let fire_id = job_id.clone();
            let fire_this = this.clone();
            run_trigger(job_id, source, cancel, move || {
                let this = fire_this.clone();
                let job_id = fire_id.clone();
                async move { this.on_fire(&job_id).await }
            })
            .await;
        });
        true
    }

    /// Trigger callback. Returns `false` to disarm.
    async fn on_fire(self: &Arc<Self>, job_id: &str) -> bool {
        match self
            .execute_job(job_id, ExecutionType::Normal, None)
            .await
        {
            Ok(_) => true,
            Err(SchedulerError::JobNotFound(_)) => {
                warn!("Job {} no longer exists, disarming its trigger", job_id);
                self.armed.disarm(job_id);
                false
            }
            Err(e) => {
                error!("Scheduled fire of job {} failed: {}", job_id, e);
                true
            }
        }
    }

    /// Fire `job_id` now: clear stale predictions, create an execution and
    /// hand it to the dispatcher. Disabled jobs are skipped.
    pub async fn execute_job(
        self: &Arc<Self>,
        job_id: &str,
        execution_type: ExecutionType,
        parameter_override: Option<&Value>,
    ) -> Result<Option<JobExecution>, SchedulerError> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        if !job.enabled {
            debug!("Job {} is disabled, skipping fire", job_id);
            return Ok(None);
        }

        self.clear_next_trigger_times(job_id).await?;
        let exec = self
            .dispatcher
            .launch(&job, execution_type, parameter_override)
            .await?;
        Ok(Some(exec))
    }

    /// Reset `nextTriggerTime` on the job's earlier executions so the missed
    /// sweep does not fire against a cycle that just started.
    async fn clear_next_trigger_times(&self, job_id: &str) -> Result<(), StoreError> {
        let pending = self
            .executions
            .find(
                &Filter::new()
                    .eq(ef::JOB_ID, job_id)
                    .neq(ef::NEXT_TRIGGER_TIME, Value::Null),
            )
            .await?;

        for exec in pending {
            let Some(next) = exec.next_trigger_time else {
                continue;
            };
            self.executions
                .update_where(
                    &exec.execution_id,
                    &Filter::new().eq(ef::NEXT_TRIGGER_TIME, next.timestamp_millis()),
                    Patch::new().set_null(ef::NEXT_TRIGGER_TIME),
                )
                .await?;
        }
        Ok(())
    }

    /// Run activation passes every `interval` until cancelled.
    pub async fn run(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.schedule_jobs().await {
                        error!("Schedule pass failed: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "schedule_manager_tests.rs"]
mod tests;
