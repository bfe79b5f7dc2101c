use std::time::Duration;

use cronrelay_core::MemoryStore;
use cronrelay_protocols::{StoreError, Successor};
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::*;
use crate::armed::ArmedTriggers;
use crate::runner_registry::RunnerRegistry;
use crate::test_support::{Harness, harness};

fn api(h: &Harness) -> ExecutionStatusApi {
    ExecutionStatusApi::new(
        h.jobs.clone(),
        h.executions.clone(),
        h.dispatcher.clone(),
        h.events.clone(),
    )
}

async fn triggered(h: &Harness, job: &Job) -> JobExecution {
    let mut exec = JobExecution::new(job, ExecutionType::Normal, None);
    exec.state = ExecutionState::Triggered;
    h.executions.create(exec).await.unwrap()
}

fn job_a() -> Job {
    Job::new("A", "builtin", "echo")
        .with_schedule("* * * * *")
        .with_successor(Successor::new("B").with_parameter(json!({"x": 1})))
}

fn job_b() -> Job {
    Job::new("B", "builtin", "echo")
        .chained()
        .with_parameter(json!({"x": 0, "y": 2}))
}

#[tokio::test]
async fn test_heartbeat_sets_running() {
    // Long retry delay keeps any background dispatch out of the way.
    let h = &harness(Duration::from_secs(60));
    let exec = triggered(h, &job_b()).await;
    let api = api(h);

    api.heartbeat(&exec.execution_id, Some(json!({"progress": 50})))
        .await
        .unwrap();

    let record = h.execution(&exec.execution_id).await;
    assert_eq!(record.state, ExecutionState::Running);
    assert!(record.last_update_time >= exec.last_update_time);
    assert_eq!(record.completion_status, Some(json!({"progress": 50})));
}

#[tokio::test]
async fn test_done_chains_successor_with_merged_parameters() {
    let h = &harness(Duration::from_secs(60));
    h.jobs.create(job_a()).await.unwrap();
    h.jobs.create(job_b()).await.unwrap();
    let exec = triggered(h, &job_a()).await;

    api(h).done(&exec.execution_id, None).await.unwrap();

    let record = h.execution(&exec.execution_id).await;
    assert_eq!(record.state, ExecutionState::Completed);
    assert!(record.completion_time.is_some());

    let chained = h.executions_of("B").await;
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].execution_type, ExecutionType::Chain);
    assert_eq!(chained[0].parameter, json!({"x": 1, "y": 2}));
}

#[tokio::test]
async fn test_done_skips_missing_successor() {
    let h = &harness(Duration::from_secs(60));
    h.jobs.create(job_a()).await.unwrap();
    let exec = triggered(h, &job_a()).await;

    api(h).done(&exec.execution_id, None).await.unwrap();
    assert!(h.executions_of("B").await.is_empty());
}

/// Execution store whose create fails while `create_failures` is non-zero.
struct FlakyExecutions {
    inner: MemoryStore<JobExecution>,
    create_failures: Mutex<u32>,
}

#[async_trait]
impl RecordStore<JobExecution> for FlakyExecutions {
    async fn find(&self, filter: &Filter) -> Result<Vec<JobExecution>, StoreError> {
        self.inner.find(filter).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<JobExecution>, StoreError> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, record: JobExecution) -> Result<JobExecution, StoreError> {
        {
            let mut remaining = self.create_failures.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StoreError::ConnectionError("store offline".to_string()));
            }
        }
        self.inner.create(record).await
    }

    async fn update_where(
        &self,
        id: &str,
        guard: &Filter,
        patch: Patch,
    ) -> Result<Option<JobExecution>, StoreError> {
        self.inner.update_where(id, guard, patch).await
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        self.inner.delete_by_id(id).await
    }
}

#[tokio::test]
async fn test_done_keeps_chaining_after_successor_launch_error() {
    let h = &harness(Duration::from_secs(60));
    let executions = Arc::new(FlakyExecutions {
        inner: MemoryStore::new(),
        create_failures: Mutex::new(0),
    });
    let dispatcher = Arc::new(Dispatcher::new(
        executions.clone(),
        Arc::new(RunnerRegistry::new(
            h.runners.clone(),
            Duration::from_secs(60),
            Duration::ZERO,
        )),
        Arc::new(ArmedTriggers::new()),
        reqwest::Client::new(),
        Duration::from_secs(60),
        CancellationToken::new(),
        h.events.clone(),
    ));
    let api = ExecutionStatusApi::new(
        h.jobs.clone(),
        executions.clone(),
        dispatcher,
        h.events.clone(),
    );

    let a = job_a().with_successor(Successor::new("C"));
    h.jobs.create(a.clone()).await.unwrap();
    h.jobs.create(job_b()).await.unwrap();
    h.jobs
        .create(Job::new("C", "builtin", "echo").chained())
        .await
        .unwrap();
    let mut exec = JobExecution::new(&a, ExecutionType::Normal, None);
    exec.state = ExecutionState::Triggered;
    let exec = executions.create(exec).await.unwrap();

    // The first successor's launch hits the outage, the second goes through.
    *executions.create_failures.lock() = 1;
    api.done(&exec.execution_id, None).await.unwrap();

    let record = executions.find_by_id(&exec.execution_id).await.unwrap().unwrap();
    assert_eq!(record.state, ExecutionState::Completed);
    let of = |job_id: &str| Filter::new().eq(ef::JOB_ID, job_id);
    assert!(executions.find(&of("B")).await.unwrap().is_empty());
    let chained = executions.find(&of("C")).await.unwrap();
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].execution_type, ExecutionType::Chain);
}

#[tokio::test]
async fn test_fail_is_terminal_and_bypasses_retry() {
    let h = &harness(Duration::from_secs(60));
    h.jobs.create(job_a()).await.unwrap();
    h.jobs.create(job_b()).await.unwrap();
    let exec = triggered(h, &job_a()).await;
    let api = api(h);

    api.fail(&exec.execution_id, Some(json!({"error": "boom"})))
        .await
        .unwrap();

    let record = h.execution(&exec.execution_id).await;
    assert_eq!(record.state, ExecutionState::Failed);
    assert_eq!(record.retry_count, 0);
    assert!(record.fail_time.is_some());
    assert!(h.executions_of("B").await.is_empty());
}

#[tokio::test]
async fn test_skip_is_terminal() {
    let h = &harness(Duration::from_secs(60));
    let exec = triggered(h, &job_b()).await;
    api(h).skip(&exec.execution_id, None).await.unwrap();
    assert_eq!(h.execution(&exec.execution_id).await.state, ExecutionState::Skipped);
}

#[tokio::test]
async fn test_terminal_execution_rejects_further_calls() {
    let h = &harness(Duration::from_secs(60));
    let exec = triggered(h, &job_b()).await;
    let api = api(h);
    api.done(&exec.execution_id, None).await.unwrap();

    let err = api.heartbeat(&exec.execution_id, None).await.unwrap_err();
    assert!(matches!(err, StatusError::NotActive { ref state, .. } if state == "COMPLETED"));
    assert!(api.fail(&exec.execution_id, None).await.is_err());
    assert_eq!(h.execution(&exec.execution_id).await.state, ExecutionState::Completed);
}

#[tokio::test]
async fn test_unknown_execution() {
    let h = &harness(Duration::from_secs(60));
    let err = api(h).done("missing", None).await.unwrap_err();
    assert!(matches!(err, StatusError::ExecutionNotFound(_)));
}

#[tokio::test]
async fn test_marked_events_emitted() {
    let h = &harness(Duration::from_secs(60));
    let exec = triggered(h, &job_b()).await;
    let mut events = h.events.subscribe();
    let api = api(h);

    api.heartbeat(&exec.execution_id, None).await.unwrap();
    api.skip(&exec.execution_id, None).await.unwrap();

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::ExecutionMarked { state, .. } = event {
            states.push(state);
        }
    }
    assert_eq!(states, vec![ExecutionState::Running, ExecutionState::Skipped]);
}
