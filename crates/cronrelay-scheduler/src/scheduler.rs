//! Leadership lifecycle of the scheduler.
//!
//! All master-only state lives in a [`MasterEpoch`] built by `start()` and
//! torn down by `stop()`. A later `start()` begins from scratch and re-scans
//! every enabled job.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use cronrelay_config::{RunnerConfig, SchedulerConfig};
use cronrelay_core::Stores;
use cronrelay_protocols::{ExecutionType, JobExecution, LeaderGate, LeadershipListener};

use crate::armed::ArmedTriggers;
use crate::defunct_monitor::DefunctMonitor;
use crate::dispatcher::Dispatcher;
use crate::error::SchedulerError;
use crate::events::{EventBus, SchedulerEvent};
use crate::runner_registry::RunnerRegistry;
use crate::schedule_manager::ScheduleManager;
use crate::status_api::ExecutionStatusApi;

/// Master-only state of one leadership term.
pub struct MasterEpoch {
    cancel: CancellationToken,
    registry: Arc<RunnerRegistry>,
    dispatcher: Arc<Dispatcher>,
    tasks: Vec<JoinHandle<()>>,
}

/// Snapshot for health reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub leader: bool,
    pub running: bool,
    pub armed_triggers: usize,
    pub cached_runners: usize,
}

pub struct JobScheduler {
    scheduler: SchedulerConfig,
    runner: RunnerConfig,
    stores: Stores,
    gate: Arc<dyn LeaderGate>,
    events: EventBus,
    armed: Arc<ArmedTriggers>,
    http: reqwest::Client,
    shutdown: CancellationToken,
    status_api: Arc<ExecutionStatusApi>,
    /// Runner snapshot of the status API's dispatcher.
    status_registry: Arc<RunnerRegistry>,
    epoch: Mutex<Option<MasterEpoch>>,
}

impl JobScheduler {
    pub fn new(
        scheduler: SchedulerConfig,
        runner: RunnerConfig,
        stores: Stores,
        gate: Arc<dyn LeaderGate>,
        events: EventBus,
    ) -> Result<Self, SchedulerError> {
        let http = reqwest::Client::builder()
            .timeout(scheduler.trigger_timeout())
            .build()
            .map_err(|e| SchedulerError::Transport(e.to_string()))?;
        let armed = Arc::new(ArmedTriggers::new());
        let shutdown = CancellationToken::new();

        // Chained executions are dispatched from whichever instance receives
        // the done() call, so the status API gets a process-lifetime dispatcher.
        let status_registry = Arc::new(RunnerRegistry::new(
            stores.runners.clone(),
            runner.heartbeat_tolerance(),
            scheduler.runner_update_interval(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            stores.executions.clone(),
            status_registry.clone(),
            armed.clone(),
            http.clone(),
            scheduler.trigger_fail_retry_delay(),
            shutdown.child_token(),
            events.clone(),
        ));
        let status_api = Arc::new(ExecutionStatusApi::new(
            stores.jobs.clone(),
            stores.executions.clone(),
            dispatcher,
            events.clone(),
        ));

        Ok(Self {
            scheduler,
            runner,
            stores,
            gate,
            events,
            armed,
            http,
            shutdown,
            status_api,
            status_registry,
            epoch: Mutex::new(None),
        })
    }

    pub fn status_api(&self) -> Arc<ExecutionStatusApi> {
        self.status_api.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn lock_name(&self) -> &str {
        &self.scheduler.lock_name
    }

    pub fn is_leader(&self) -> bool {
        self.gate.is_leader(&self.scheduler.lock_name)
    }

    /// Begin a leadership term. Returns `false` if already running or if
    /// scheduling is disabled in configuration.
    pub async fn start(&self) -> bool {
        let mut epoch = self.epoch.lock().await;
        if epoch.is_some() {
            return false;
        }
        if !self.scheduler.enabled {
            info!("Scheduling disabled in configuration, not starting");
            return false;
        }

        *epoch = Some(self.build_epoch());
        info!("Job scheduler started (lock {})", self.scheduler.lock_name);
        self.events.emit(SchedulerEvent::SchedulerStarted);
        true
    }

    fn build_epoch(&self) -> MasterEpoch {
        let cancel = self.shutdown.child_token();
        let registry = Arc::new(RunnerRegistry::new(
            self.stores.runners.clone(),
            self.runner.heartbeat_tolerance(),
            self.scheduler.runner_update_interval(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            self.stores.executions.clone(),
            registry.clone(),
            self.armed.clone(),
            self.http.clone(),
            self.scheduler.trigger_fail_retry_delay(),
            cancel.clone(),
            self.events.clone(),
        ));
        let manager = Arc::new(ScheduleManager::new(
            self.stores.jobs.clone(),
            self.stores.executions.clone(),
            self.armed.clone(),
            dispatcher.clone(),
            cancel.clone(),
            self.events.clone(),
        ));
        let monitor = Arc::new(DefunctMonitor::new(
            self.stores.jobs.clone(),
            self.stores.executions.clone(),
            dispatcher.clone(),
            self.gate.clone(),
            self.scheduler.lock_name.clone(),
            self.scheduler.enabled,
            self.scheduler.defunct_tolerance(),
            self.scheduler.missed_trigger_grace(),
            self.events.clone(),
        ));

        let tasks = vec![
            tokio::spawn(
                registry
                    .clone()
                    .run_refresh_loop(self.scheduler.runner_update_interval(), cancel.clone()),
            ),
            tokio::spawn(
                registry
                    .clone()
                    .run_cleanup_loop(self.runner.cleanup_interval(), cancel.clone()),
            ),
            tokio::spawn(manager.run(self.scheduler.schedule_new_jobs_interval())),
            tokio::spawn(monitor.run(self.scheduler.defunct_retry_interval(), cancel.clone())),
        ];

        MasterEpoch {
            cancel,
            registry,
            dispatcher,
            tasks,
        }
    }

    /// End the leadership term: cancel every loop and trigger and drop the
    /// runner snapshot. In-flight dispatches stop before their next write.
    pub async fn stop(&self) -> bool {
        let Some(epoch) = self.epoch.lock().await.take() else {
            return false;
        };

        epoch.cancel.cancel();
        self.armed.clear();
        epoch.registry.reset();
        self.status_registry.reset();
        for task in epoch.tasks {
            if let Err(e) = task.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }

        info!("Job scheduler stopped (lock {})", self.scheduler.lock_name);
        self.events.emit(SchedulerEvent::SchedulerStopped);
        true
    }

    /// Stop and cancel every process-lifetime task.
    pub async fn shutdown(&self) {
        self.stop().await;
        self.shutdown.cancel();
    }

    /// Fire a job immediately as a MANUAL execution. Leader only.
    pub async fn execute_job_now(
        &self,
        job_id: &str,
        parameter_override: Option<&Value>,
    ) -> Result<JobExecution, SchedulerError> {
        if !self.is_leader() {
            return Err(SchedulerError::NotLeader);
        }
        let dispatcher = match self.epoch.lock().await.as_ref() {
            Some(epoch) => epoch.dispatcher.clone(),
            None => return Err(SchedulerError::NotLeader),
        };

        let job = self
            .stores
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| SchedulerError::JobNotFound(job_id.to_string()))?;

        let exec = dispatcher
            .launch(&job, ExecutionType::Manual, parameter_override)
            .await?;
        info!("Job {} run on demand as execution {}", job_id, exec.exec_id);
        Ok(exec)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let epoch = self.epoch.lock().await;
        SchedulerStatus {
            leader: self.is_leader(),
            running: epoch.is_some(),
            armed_triggers: self.armed.len(),
            cached_runners: epoch.as_ref().map_or(0, |e| e.registry.len()),
        }
    }
}

#[async_trait]
impl LeadershipListener for JobScheduler {
    async fn on_acquired(&self) {
        self.start().await;
    }

    async fn on_lost(&self) {
        self.stop().await;
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
