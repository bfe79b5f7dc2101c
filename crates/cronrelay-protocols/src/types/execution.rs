//! Job execution record and its state machine.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{Job, merge_parameters};
use crate::store::Record;

/// Length of the short execution id embedded in trigger URLs and logs.
pub const EXEC_ID_LEN: usize = 6;

/// Lifecycle state of a [`JobExecution`].
///
/// `CREATED -> TRIGGERED | RE-TRIGGERED -> RUNNING -> COMPLETED | FAILED | SKIPPED`,
/// with `RETRYING` between dispatch attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum ExecutionState {
    Created,
    Triggered,
    ReTriggered,
    Running,
    Retrying,
    Completed,
    Failed,
    Skipped,
}

impl ExecutionState {
    pub const ALL: [ExecutionState; 8] = [
        ExecutionState::Created,
        ExecutionState::Triggered,
        ExecutionState::ReTriggered,
        ExecutionState::Running,
        ExecutionState::Retrying,
        ExecutionState::Completed,
        ExecutionState::Failed,
        ExecutionState::Skipped,
    ];

    pub const TERMINAL: [ExecutionState; 3] = [
        ExecutionState::Completed,
        ExecutionState::Failed,
        ExecutionState::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Created => "CREATED",
            ExecutionState::Triggered => "TRIGGERED",
            ExecutionState::ReTriggered => "RE-TRIGGERED",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Retrying => "RETRYING",
            ExecutionState::Completed => "COMPLETED",
            ExecutionState::Failed => "FAILED",
            ExecutionState::Skipped => "SKIPPED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    /// Parse the wire form, e.g. `RE-TRIGGERED`. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused an execution to be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionType {
    /// Fired by the job's own cron or interval trigger.
    Normal,
    /// Catch-up for a cron fire that was predicted but never happened.
    Missed,
    /// Fired by a predecessor's completion.
    Chain,
    /// Fired on demand through run-now.
    Manual,
}

impl ExecutionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionType::Normal => "NORMAL",
            ExecutionType::Missed => "MISSED",
            ExecutionType::Chain => "CHAIN",
            ExecutionType::Manual => "MANUAL",
        }
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One firing of a [`Job`].
///
/// Retries mutate the same record; only distinct firings create new ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobExecution {
    #[serde(rename = "executionID")]
    pub execution_id: String,

    #[serde(rename = "execID")]
    pub exec_id: String,

    #[serde(rename = "jobID")]
    pub job_id: String,

    pub mdl: String,

    #[serde(rename = "fn")]
    pub function: String,

    pub state: ExecutionState,

    #[serde(rename = "type")]
    pub execution_type: ExecutionType,

    #[serde(default)]
    pub parameter: Value,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub schedule_time: DateTime<Utc>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_time: DateTime<Utc>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub trigger_time: Option<DateTime<Utc>>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_update_time: DateTime<Utc>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub completion_time: Option<DateTime<Utc>>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub fail_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub retry_enabled: bool,

    #[serde(default)]
    pub retry_count: u32,

    #[serde(default)]
    pub max_retry_count: u32,

    #[serde(default)]
    pub retry_reason: Option<String>,

    #[serde(default)]
    pub assigned_runner: Option<String>,

    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub next_trigger_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub completion_status: Option<Value>,
}

impl JobExecution {
    /// Create a fresh `CREATED` execution of `job`.
    ///
    /// The parameter is the job's default merged with `parameter_override`.
    pub fn new(job: &Job, execution_type: ExecutionType, parameter_override: Option<&Value>) -> Self {
        let now = Utc::now();
        let execution_id = Uuid::new_v4().to_string();
        let exec_id = short_exec_id(&execution_id);
        let parameter = match parameter_override {
            Some(over) => merge_parameters(&job.parameter, over),
            None => job.parameter.clone(),
        };

        Self {
            execution_id,
            exec_id,
            job_id: job.job_id.clone(),
            mdl: job.mdl.clone(),
            function: job.function.clone(),
            state: ExecutionState::Created,
            execution_type,
            parameter,
            schedule_time: now,
            created_time: now,
            trigger_time: None,
            last_update_time: now,
            completion_time: None,
            fail_time: None,
            retry_enabled: job.retry_enabled,
            retry_count: 0,
            max_retry_count: job.max_retry_count,
            retry_reason: None,
            assigned_runner: None,
            next_trigger_time: None,
            completion_status: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `true` while another dispatch attempt is allowed.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retry_count
    }

    /// State a successful trigger moves this execution into.
    pub fn triggered_state(&self) -> ExecutionState {
        if self.retry_count > 0 {
            ExecutionState::ReTriggered
        } else {
            ExecutionState::Triggered
        }
    }

    pub fn handler_key(&self) -> String {
        format!("{}.{}", self.mdl, self.function)
    }
}

impl Record for JobExecution {
    const COLLECTION: &'static str = "JobExecution";

    fn record_id(&self) -> &str {
        &self.execution_id
    }
}

/// The trailing [`EXEC_ID_LEN`] characters of an execution id.
pub fn short_exec_id(execution_id: &str) -> String {
    let count = execution_id.chars().count();
    execution_id
        .chars()
        .skip(count.saturating_sub(EXEC_ID_LEN))
        .collect()
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
