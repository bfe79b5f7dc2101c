use super::*;
use serde_json::json;

#[test]
fn test_cron_job_kind() {
    let job = Job::new("JOB1", "reports", "nightly").with_schedule("* * * * *");
    assert_eq!(
        job.validate().unwrap(),
        ScheduleKind::Cron("* * * * *".to_string())
    );
}

#[test]
fn test_interval_job_kind() {
    let job = Job::new("JOB5", "reports", "nightly").with_interval(Duration::from_secs(45));
    assert_eq!(
        job.validate().unwrap(),
        ScheduleKind::Interval(Duration::from_millis(45_000))
    );
}

#[test]
fn test_chain_job_kind() {
    let job = Job::new("JOB13", "reports", "nightly").chained();
    assert_eq!(job.validate().unwrap(), ScheduleKind::Chain);
    assert!(job.is_chain());
}

#[test]
fn test_missing_schedule_and_interval_rejected() {
    let job = Job::new("JOB7", "reports", "nightly");
    assert_eq!(
        job.validate().unwrap_err(),
        ValidationError::MissingSchedule("JOB7".to_string())
    );
}

#[test]
fn test_blank_schedule_counts_as_missing() {
    let job = Job::new("JOB7", "reports", "nightly").with_schedule("   ");
    assert!(matches!(
        job.validate(),
        Err(ValidationError::MissingSchedule(_))
    ));
}

#[test]
fn test_schedule_and_interval_rejected() {
    let job = Job::new("JOB1", "reports", "nightly")
        .with_schedule("* * * * *")
        .with_interval(Duration::from_secs(10));
    assert!(matches!(
        job.validate(),
        Err(ValidationError::AmbiguousSchedule(_))
    ));
}

#[test]
fn test_zero_interval_rejected() {
    let mut job = Job::new("JOB1", "reports", "nightly");
    job.interval = Some(0);
    assert!(matches!(job.validate(), Err(ValidationError::InvalidInterval(_))));
}

#[test]
fn test_missing_module_rejected() {
    let job = Job::new("JOB4", "", "function4").with_schedule("* * * * *");
    assert!(matches!(job.validate(), Err(ValidationError::MissingModule(_))));
}

#[test]
fn test_missing_function_rejected() {
    let job = Job::new("JOB3", "reports", "").with_schedule("* * * * *");
    assert!(matches!(job.validate(), Err(ValidationError::MissingFunction(_))));
}

#[test]
fn test_blank_successor_rejected() {
    let job = Job::new("JOB12", "reports", "nightly")
        .with_schedule("* * * * *")
        .with_successor(Successor::new(""));
    assert!(matches!(job.validate(), Err(ValidationError::InvalidSuccessor(_))));
}

#[test]
fn test_deserialize_wire_names() {
    let job: Job = serde_json::from_value(json!({
        "jobID": "JOB12",
        "schedule": "* * * * *",
        "successors": [{"jobID": "JOB13", "parameter": {"param": 13}}],
        "mdl": "test/jobs/job-module1",
        "fn": "function12",
        "retryEnabled": true,
        "maxRetryCount": 2
    }))
    .unwrap();

    assert_eq!(job.job_id, "JOB12");
    assert_eq!(job.function, "function12");
    assert!(job.enabled);
    assert!(!job.scheduled);
    assert_eq!(job.max_retry_count, 2);
    assert_eq!(job.successors[0].job_id, "JOB13");
    assert_eq!(job.successors[0].parameter, json!({"param": 13}));
}

#[test]
fn test_deserialize_defaults() {
    let job: Job = serde_json::from_value(json!({
        "jobID": "JOB1",
        "interval": 1000,
        "mdl": "m",
        "fn": "f"
    }))
    .unwrap();
    assert!(job.retry_enabled);
    assert_eq!(job.max_retry_count, DEFAULT_MAX_RETRY_COUNT);
    assert!(job.successors.is_empty());
    assert_eq!(job.parameter, Value::Null);
}
