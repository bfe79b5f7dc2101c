use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

use super::*;
use crate::dispatcher::DispatchOutcome;
use crate::status_api::ExecutionStatusApi;
use crate::test_support::{Harness, harness, wait_for};
use crate::triggers::{CronTrigger, TriggerSource};
use cronrelay_core::LocalLeaderGate;
use cronrelay_protocols::ExecutionStatus;

const LOCK: &str = "JOB-SCHEDULER";

async fn monitor(h: &Harness, leader: bool, scheduling_enabled: bool) -> DefunctMonitor {
    let gate = Arc::new(LocalLeaderGate::new(LOCK));
    if leader {
        gate.enable("test").await;
    }
    DefunctMonitor::new(
        h.jobs.clone(),
        h.executions.clone(),
        h.dispatcher.clone(),
        gate,
        LOCK,
        scheduling_enabled,
        Duration::from_secs(90),
        Duration::from_secs(30),
        h.events.clone(),
    )
}

fn job(retry_enabled: bool) -> Job {
    Job::new("JOB1", "builtin", "echo")
        .with_schedule("* * * * *")
        .with_retry(retry_enabled, 3)
}

async fn stalled_execution(h: &Harness, job: &Job) -> JobExecution {
    let mut exec = JobExecution::new(job, ExecutionType::Normal, None);
    exec.state = ExecutionState::Triggered;
    exec.last_update_time = Utc::now() - chrono::Duration::seconds(300);
    h.executions.create(exec).await.unwrap()
}

async fn accepting_runner(h: &Harness) -> MockServer {
    let server = MockServer::start().await;
    h.add_runner("r1", &server).await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_stalled_execution_retried_with_reason() {
    let h = &harness(Duration::from_millis(5));
    let _server = accepting_runner(h).await;
    let exec = stalled_execution(h, &job(true)).await;
    let monitor = monitor(h, true, true).await;

    assert_eq!(monitor.sweep_stalled().await.unwrap(), 1);

    let id = exec.execution_id.clone();
    let retriggered = wait_for(Duration::from_secs(2), move || {
        let id = id.clone();
        async move { h.execution(&id).await.state == ExecutionState::ReTriggered }
    })
    .await;
    assert!(retriggered);

    let record = h.execution(&exec.execution_id).await;
    assert_eq!(record.retry_reason.as_deref(), Some(REASON_MISSED_HEARTBEAT));
    assert_eq!(record.retry_count, 1);
}

#[tokio::test]
async fn test_stalled_execution_without_retry_fails() {
    let h = &harness(Duration::from_millis(5));
    let exec = stalled_execution(h, &job(false)).await;
    let monitor = monitor(h, true, true).await;

    assert_eq!(monitor.sweep_stalled().await.unwrap(), 1);

    let record = h.execution(&exec.execution_id).await;
    assert_eq!(record.state, ExecutionState::Failed);
    assert_eq!(record.retry_reason.as_deref(), Some(REASON_NO_HEARTBEAT));
    assert!(record.fail_time.is_some());
}

#[tokio::test]
async fn test_heartbeat_between_scan_and_write_wins() {
    let h = &harness(Duration::from_millis(5));
    let _server = accepting_runner(h).await;
    let retried = stalled_execution(h, &job(true)).await;
    let failed = stalled_execution(h, &job(false)).await;

    // Guards are taken at scan time, before job code reports back.
    let cutoff = cutoff(Duration::from_secs(90));
    let retry_guard = stall_guard(&retried, cutoff);
    let fail_guard = stall_guard(&failed, cutoff);

    let status = ExecutionStatusApi::new(
        h.jobs.clone(),
        h.executions.clone(),
        h.dispatcher.clone(),
        h.events.clone(),
    );
    status.heartbeat(&retried.execution_id, None).await.unwrap();
    status.heartbeat(&failed.execution_id, None).await.unwrap();

    let outcome = h
        .dispatcher
        .retry(retried.clone(), REASON_MISSED_HEARTBEAT, retry_guard)
        .await
        .unwrap();
    assert_eq!(outcome, DispatchOutcome::Superseded(retried.execution_id.clone()));
    let write = h
        .executions
        .update_where(&failed.execution_id, &fail_guard, stall_failure(Utc::now()))
        .await
        .unwrap();
    assert!(write.is_none());

    for id in [&retried.execution_id, &failed.execution_id] {
        let record = h.execution(id).await;
        assert_eq!(record.state, ExecutionState::Running);
        assert_eq!(record.retry_count, 0);
        assert!(record.retry_reason.is_none());
        assert!(record.fail_time.is_none());
    }
}

#[tokio::test]
async fn test_fresh_and_terminal_executions_untouched() {
    let h = &harness(Duration::from_millis(5));
    let j = job(false);

    let fresh = h
        .executions
        .create(JobExecution::new(&j, ExecutionType::Normal, None))
        .await
        .unwrap();
    let mut skipped = stalled_execution(h, &j).await;
    skipped = h
        .executions
        .update_by_id(
            &skipped.execution_id,
            Patch::new().set(ef::STATE, ExecutionState::Skipped),
        )
        .await
        .unwrap()
        .unwrap();
    let mut done = JobExecution::new(&j, ExecutionType::Normal, None);
    done.state = ExecutionState::Completed;
    done.last_update_time = Utc::now() - chrono::Duration::hours(2);
    h.executions.create(done.clone()).await.unwrap();

    let monitor = monitor(h, true, true).await;
    assert_eq!(monitor.sweep_stalled().await.unwrap(), 0);
    assert_eq!(h.execution(&fresh.execution_id).await, fresh);
    assert_eq!(h.execution(&skipped.execution_id).await, skipped);
    assert_eq!(h.execution(&done.execution_id).await, done);
}

#[tokio::test]
async fn test_missed_fire_spawns_one_missed_execution() {
    let h = &harness(Duration::from_millis(5));
    let _server = accepting_runner(h).await;
    let j = job(true);
    h.jobs.create(j.clone()).await.unwrap();

    let mut previous = JobExecution::new(&j, ExecutionType::Normal, None);
    previous.state = ExecutionState::Completed;
    previous.next_trigger_time = Some(Utc::now() - chrono::Duration::seconds(120));
    h.executions.create(previous.clone()).await.unwrap();

    let monitor = monitor(h, true, true).await;
    let mut events = h.events.subscribe();
    assert_eq!(monitor.sweep_missed().await.unwrap(), 1);
    assert_eq!(monitor.sweep_missed().await.unwrap(), 0);

    assert!(h.execution(&previous.execution_id).await.next_trigger_time.is_none());
    let missed: Vec<JobExecution> = h
        .executions_of("JOB1")
        .await
        .into_iter()
        .filter(|e| e.execution_type == ExecutionType::Missed)
        .collect();
    assert_eq!(missed.len(), 1);

    let mut saw_event = false;
    while let Ok(event) = events.try_recv() {
        if let SchedulerEvent::MissedJobExecuted {
            missed_execution_id,
            ..
        } = event
        {
            assert_eq!(missed_execution_id, previous.execution_id);
            saw_event = true;
        }
    }
    assert!(saw_event);
}

#[tokio::test]
async fn test_manual_run_does_not_double_catch_up_missed_slot() {
    let h = &harness(Duration::from_millis(5));
    let _server = accepting_runner(h).await;
    let j = job(true);
    h.jobs.create(j.clone()).await.unwrap();
    let source: Arc<dyn TriggerSource> = Arc::new(CronTrigger::new("* * * * *").unwrap());
    h.armed.insert("JOB1", source, CancellationToken::new());

    let normal = h.dispatcher.launch(&j, ExecutionType::Normal, None).await.unwrap();
    let manual = h.dispatcher.launch(&j, ExecutionType::Manual, None).await.unwrap();
    let ids = [normal.execution_id.clone(), manual.execution_id.clone()];
    let triggered = wait_for(Duration::from_secs(2), || {
        let ids = ids.clone();
        async move {
            for id in &ids {
                if h.execution(id).await.state != ExecutionState::Triggered {
                    return false;
                }
            }
            true
        }
    })
    .await;
    assert!(triggered);
    assert!(h.execution(&manual.execution_id).await.next_trigger_time.is_none());

    // Leadership dropped over the predicted slot.
    let stale = Utc::now() - chrono::Duration::seconds(120);
    for exec in h.executions_of("JOB1").await {
        if exec.next_trigger_time.is_some() {
            h.executions
                .update_by_id(
                    &exec.execution_id,
                    Patch::new().set_time(ef::NEXT_TRIGGER_TIME, stale),
                )
                .await
                .unwrap();
        }
    }
    h.armed.clear();

    let monitor = monitor(h, true, true).await;
    assert_eq!(monitor.sweep_missed().await.unwrap(), 1);
    let missed = h
        .executions_of("JOB1")
        .await
        .into_iter()
        .filter(|e| e.execution_type == ExecutionType::Missed)
        .count();
    assert_eq!(missed, 1);
}

#[tokio::test]
async fn test_prediction_within_grace_left_alone() {
    let h = &harness(Duration::from_millis(5));
    let j = job(true);
    h.jobs.create(j.clone()).await.unwrap();
    let mut previous = JobExecution::new(&j, ExecutionType::Normal, None);
    previous.next_trigger_time = Some(Utc::now() - chrono::Duration::seconds(5));
    h.executions.create(previous.clone()).await.unwrap();

    let monitor = monitor(h, true, true).await;
    assert_eq!(monitor.sweep_missed().await.unwrap(), 0);
    assert!(h.execution(&previous.execution_id).await.next_trigger_time.is_some());
}

#[tokio::test]
async fn test_missed_sweep_requires_leadership_and_scheduling() {
    let h = &harness(Duration::from_millis(5));
    let j = job(true);
    h.jobs.create(j.clone()).await.unwrap();
    let mut previous = JobExecution::new(&j, ExecutionType::Normal, None);
    previous.next_trigger_time = Some(Utc::now() - chrono::Duration::seconds(120));
    h.executions.create(previous).await.unwrap();

    assert_eq!(monitor(h, false, true).await.sweep_missed().await.unwrap(), 0);
    assert_eq!(monitor(h, true, false).await.sweep_missed().await.unwrap(), 0);
    assert_eq!(h.executions_of("JOB1").await.len(), 1);
}

#[tokio::test]
async fn test_missed_fire_of_disabled_job_dropped() {
    let h = &harness(Duration::from_millis(5));
    let j = job(true).with_enabled(false);
    h.jobs.create(j.clone()).await.unwrap();
    let mut previous = JobExecution::new(&j, ExecutionType::Normal, None);
    previous.next_trigger_time = Some(Utc::now() - chrono::Duration::seconds(120));
    h.executions.create(previous.clone()).await.unwrap();

    let monitor = monitor(h, true, true).await;
    assert_eq!(monitor.sweep_missed().await.unwrap(), 0);
    assert!(h.execution(&previous.execution_id).await.next_trigger_time.is_none());
    assert_eq!(h.executions_of("JOB1").await.len(), 1);
}
