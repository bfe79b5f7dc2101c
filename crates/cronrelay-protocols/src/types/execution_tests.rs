use super::*;
use serde_json::json;

fn sample_job() -> Job {
    Job::new("JOB1", "reports", "nightly")
        .with_schedule("* * * * *")
        .with_parameter(json!({"region": "eu", "limit": 10}))
        .with_retry(false, 5)
}

#[test]
fn test_new_execution_defaults() {
    let exec = JobExecution::new(&sample_job(), ExecutionType::Normal, None);

    assert_eq!(exec.state, ExecutionState::Created);
    assert_eq!(exec.job_id, "JOB1");
    assert_eq!(exec.mdl, "reports");
    assert_eq!(exec.function, "nightly");
    assert_eq!(exec.retry_count, 0);
    assert_eq!(exec.max_retry_count, 5);
    assert!(!exec.retry_enabled);
    assert_eq!(exec.parameter, json!({"region": "eu", "limit": 10}));
    assert!(exec.next_trigger_time.is_none());
    assert_eq!(exec.exec_id.len(), EXEC_ID_LEN);
    assert!(exec.execution_id.ends_with(&exec.exec_id));
}

#[test]
fn test_new_execution_merges_override() {
    let over = json!({"limit": 99, "dryRun": true});
    let exec = JobExecution::new(&sample_job(), ExecutionType::Manual, Some(&over));
    assert_eq!(
        exec.parameter,
        json!({"region": "eu", "limit": 99, "dryRun": true})
    );
    assert_eq!(exec.execution_type, ExecutionType::Manual);
}

#[test]
fn test_execution_ids_unique() {
    let job = sample_job();
    let a = JobExecution::new(&job, ExecutionType::Normal, None);
    let b = JobExecution::new(&job, ExecutionType::Normal, None);
    assert_ne!(a.execution_id, b.execution_id);
}

#[test]
fn test_short_exec_id() {
    assert_eq!(short_exec_id("0123456789abcdef"), "abcdef");
    assert_eq!(short_exec_id("abc"), "abc");
}

#[test]
fn test_state_wire_names() {
    assert_eq!(
        serde_json::to_value(ExecutionState::ReTriggered).unwrap(),
        json!("RE-TRIGGERED")
    );
    assert_eq!(
        serde_json::from_value::<ExecutionState>(json!("RETRYING")).unwrap(),
        ExecutionState::Retrying
    );
    for state in ExecutionState::ALL {
        assert_eq!(serde_json::to_value(state).unwrap(), json!(state.as_str()));
    }
}

#[test]
fn test_state_parse() {
    assert_eq!(ExecutionState::parse("re-triggered"), Some(ExecutionState::ReTriggered));
    assert_eq!(ExecutionState::parse("COMPLETED"), Some(ExecutionState::Completed));
    assert_eq!(ExecutionState::parse("bogus"), None);
}

#[test]
fn test_terminal_states() {
    assert!(ExecutionState::Completed.is_terminal());
    assert!(ExecutionState::Failed.is_terminal());
    assert!(ExecutionState::Skipped.is_terminal());
    assert!(!ExecutionState::Running.is_terminal());
    assert!(!ExecutionState::Retrying.is_terminal());
}

#[test]
fn test_triggered_state_depends_on_retry_count() {
    let mut exec = JobExecution::new(&sample_job(), ExecutionType::Normal, None);
    assert_eq!(exec.triggered_state(), ExecutionState::Triggered);
    exec.retry_count = 1;
    assert_eq!(exec.triggered_state(), ExecutionState::ReTriggered);
}

#[test]
fn test_can_retry_bound() {
    let mut exec = JobExecution::new(&sample_job(), ExecutionType::Normal, None);
    exec.max_retry_count = 2;
    assert!(exec.can_retry());
    exec.retry_count = 2;
    assert!(!exec.can_retry());
}

#[test]
fn test_serialized_shape() {
    let exec = JobExecution::new(&sample_job(), ExecutionType::Chain, None);
    let value = serde_json::to_value(&exec).unwrap();

    assert_eq!(value["jobID"], json!("JOB1"));
    assert_eq!(value["fn"], json!("nightly"));
    assert_eq!(value["type"], json!("CHAIN"));
    assert_eq!(value["state"], json!("CREATED"));
    assert!(value["lastUpdateTime"].is_i64());
    assert!(value["nextTriggerTime"].is_null());

    let back: JobExecution = serde_json::from_value(value).unwrap();
    assert_eq!(back.execution_id, exec.execution_id);
    assert_eq!(
        back.last_update_time.timestamp_millis(),
        exec.last_update_time.timestamp_millis()
    );
}
