//! Shared fixtures for unit tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::MockServer;

use cronrelay_core::{MemoryStore, Stores};
use cronrelay_protocols::{Job, JobExecution, JobRunner, RecordStore};

use crate::armed::ArmedTriggers;
use crate::dispatcher::Dispatcher;
use crate::events::EventBus;
use crate::runner_registry::RunnerRegistry;

pub struct Harness {
    pub jobs: Arc<MemoryStore<Job>>,
    pub executions: Arc<MemoryStore<JobExecution>>,
    pub runners: Arc<MemoryStore<JobRunner>>,
    pub armed: Arc<ArmedTriggers>,
    pub active: CancellationToken,
    pub events: EventBus,
    pub dispatcher: Arc<Dispatcher>,
}

impl Harness {
    pub fn stores(&self) -> Stores {
        Stores::new(self.jobs.clone(), self.executions.clone(), self.runners.clone())
    }

    pub async fn add_runner(&self, id: &str, server: &MockServer) {
        let addr = server.address();
        self.runners
            .create(JobRunner::new(id, addr.ip().to_string(), addr.port()))
            .await
            .unwrap();
    }

    pub async fn execution(&self, id: &str) -> JobExecution {
        self.executions.find_by_id(id).await.unwrap().unwrap()
    }

    pub async fn executions_of(&self, job_id: &str) -> Vec<JobExecution> {
        self.executions
            .find(&cronrelay_protocols::Filter::new().eq("jobID", job_id))
            .await
            .unwrap()
    }
}

pub fn harness(retry_delay: Duration) -> Harness {
    let jobs = Arc::new(MemoryStore::<Job>::new());
    let executions = Arc::new(MemoryStore::<JobExecution>::new());
    let runners = Arc::new(MemoryStore::<JobRunner>::new());
    let armed = Arc::new(ArmedTriggers::new());
    let active = CancellationToken::new();
    let events = EventBus::new();
    let registry = Arc::new(RunnerRegistry::new(
        runners.clone(),
        Duration::from_secs(60),
        Duration::ZERO,
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        executions.clone(),
        registry,
        armed.clone(),
        reqwest::Client::new(),
        retry_delay,
        active.clone(),
        events.clone(),
    ));
    Harness {
        jobs,
        executions,
        runners,
        armed,
        active,
        events,
        dispatcher,
    }
}

/// Poll `check` every 10ms until it returns true or `timeout` elapses.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
