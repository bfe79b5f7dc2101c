//! Job validation errors.

use thiserror::Error;

/// Reasons a job definition is rejected at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Job is missing a jobID")]
    MissingJobId,

    #[error("Job {0} has neither a schedule, an interval nor the chain marker")]
    MissingSchedule(String),

    #[error("Job {0} declares both a schedule and an interval")]
    AmbiguousSchedule(String),

    #[error("Job {job_id} has an invalid cron expression '{expression}': {reason}")]
    InvalidCron {
        job_id: String,
        expression: String,
        reason: String,
    },

    #[error("Job {0} has a zero interval")]
    InvalidInterval(String),

    #[error("Job {0} is missing a handler module (mdl)")]
    MissingModule(String),

    #[error("Job {0} is missing a handler function (fn)")]
    MissingFunction(String),

    #[error("Job {job_id}: no handler registered for {mdl}.{function}")]
    HandlerNotFound {
        job_id: String,
        mdl: String,
        function: String,
    },

    #[error("Job {0} has a successor without a jobID")]
    InvalidSuccessor(String),

    #[error("Job {0} already exists")]
    DuplicateJob(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_schedule_display() {
        let err = ValidationError::MissingSchedule("JOB7".to_string());
        let display = err.to_string();
        assert!(display.contains("JOB7"));
        assert!(display.contains("chain marker"));
    }

    #[test]
    fn test_handler_not_found_display() {
        let err = ValidationError::HandlerNotFound {
            job_id: "JOB5".to_string(),
            mdl: "reports".to_string(),
            function: "nightly".to_string(),
        };
        assert!(err.to_string().contains("reports.nightly"));
    }

    #[test]
    fn test_invalid_cron_display() {
        let err = ValidationError::InvalidCron {
            job_id: "JOB1".to_string(),
            expression: "61 * * * *".to_string(),
            reason: "out of range".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("61 * * * *"));
        assert!(display.contains("out of range"));
    }
}
