//! Record types shared by every CronRelay component.

mod execution;
mod job;
mod parameter;
mod runner;

pub use execution::*;
pub use job::*;
pub use parameter::merge_parameters;
pub use runner::*;

/// Store field names used when building filters and patches.
///
/// These match the serialized (wire) names of the record fields.
pub mod fields {
    pub mod job {
        pub const JOB_ID: &str = "jobID";
        pub const ENABLED: &str = "enabled";
        pub const SCHEDULED: &str = "scheduled";
    }

    pub mod execution {
        pub const EXECUTION_ID: &str = "executionID";
        pub const JOB_ID: &str = "jobID";
        pub const STATE: &str = "state";
        pub const TYPE: &str = "type";
        pub const TRIGGER_TIME: &str = "triggerTime";
        pub const LAST_UPDATE_TIME: &str = "lastUpdateTime";
        pub const COMPLETION_TIME: &str = "completionTime";
        pub const FAIL_TIME: &str = "failTime";
        pub const RETRY_COUNT: &str = "retryCount";
        pub const RETRY_REASON: &str = "retryReason";
        pub const ASSIGNED_RUNNER: &str = "assignedRunner";
        pub const NEXT_TRIGGER_TIME: &str = "nextTriggerTime";
        pub const COMPLETION_STATUS: &str = "completionStatus";
    }

    pub mod runner {
        pub const INSTANCE_ID: &str = "instanceID";
        pub const HEARTBEAT_TIME: &str = "heartbeatTime";
    }
}
