//! Application state shared across handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cronrelay_core::{JobCatalog, LocalLeaderGate, Stores};
use cronrelay_scheduler::{ExecutionStatusApi, JobRunnerEndpoint, JobScheduler};

pub struct AppState {
    pub catalog: Arc<JobCatalog>,
    pub scheduler: Arc<JobScheduler>,
    pub endpoint: Arc<JobRunnerEndpoint>,
    pub status: Arc<ExecutionStatusApi>,
    pub stores: Stores,
    pub gate: Arc<LocalLeaderGate>,
    /// Instance id of the local runner, if this process runs jobs.
    pub runner_id: Option<String>,
    start_time: Instant,
}

impl AppState {
    pub fn new(
        catalog: Arc<JobCatalog>,
        scheduler: Arc<JobScheduler>,
        endpoint: Arc<JobRunnerEndpoint>,
        stores: Stores,
        gate: Arc<LocalLeaderGate>,
        runner_id: Option<String>,
    ) -> Self {
        Self {
            catalog,
            status: scheduler.status_api(),
            scheduler,
            endpoint,
            stores,
            gate,
            runner_id,
            start_time: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
