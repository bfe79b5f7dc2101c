//! Job definition.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::store::Record;

/// Schedule sentinel for jobs fired only by a predecessor's completion.
pub const CHAIN_SCHEDULE: &str = "chain";

/// Default bound on dispatch retries when a job does not set one.
pub const DEFAULT_MAX_RETRY_COUNT: u32 = 3;

fn default_true() -> bool {
    true
}

fn default_max_retry_count() -> u32 {
    DEFAULT_MAX_RETRY_COUNT
}

/// A successor fired when the owning job completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Successor {
    #[serde(rename = "jobID")]
    pub job_id: String,

    /// Parameter override merged over the successor's own defaults.
    #[serde(default)]
    pub parameter: Value,
}

impl Successor {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            parameter: Value::Null,
        }
    }

    pub fn with_parameter(mut self, parameter: Value) -> Self {
        self.parameter = parameter;
        self
    }
}

/// A schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "jobID", default)]
    pub job_id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Cron expression, or [`CHAIN_SCHEDULE`].
    #[serde(default)]
    pub schedule: Option<String>,

    /// Fixed interval in milliseconds.
    #[serde(default)]
    pub interval: Option<u64>,

    /// Handler module name.
    #[serde(default)]
    pub mdl: String,

    /// Handler function name within `mdl`.
    #[serde(rename = "fn", default)]
    pub function: String,

    #[serde(default)]
    pub successors: Vec<Successor>,

    #[serde(default = "default_true")]
    pub retry_enabled: bool,

    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,

    /// Default invocation payload.
    #[serde(default)]
    pub parameter: Value,

    /// Set once a trigger has been armed for this job.
    #[serde(default)]
    pub scheduled: bool,
}

/// How a job gets fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleKind {
    Cron(String),
    Interval(Duration),
    Chain,
}

impl Job {
    /// Create an enabled job bound to the handler `mdl.function`, with no schedule yet.
    pub fn new(
        job_id: impl Into<String>,
        mdl: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            enabled: true,
            schedule: None,
            interval: None,
            mdl: mdl.into(),
            function: function.into(),
            successors: Vec::new(),
            retry_enabled: true,
            max_retry_count: DEFAULT_MAX_RETRY_COUNT,
            parameter: Value::Null,
            scheduled: false,
        }
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval.as_millis() as u64);
        self
    }

    pub fn chained(mut self) -> Self {
        self.schedule = Some(CHAIN_SCHEDULE.to_string());
        self
    }

    pub fn with_successor(mut self, successor: Successor) -> Self {
        self.successors.push(successor);
        self
    }

    pub fn with_parameter(mut self, parameter: Value) -> Self {
        self.parameter = parameter;
        self
    }

    pub fn with_retry(mut self, enabled: bool, max_retry_count: u32) -> Self {
        self.retry_enabled = enabled;
        self.max_retry_count = max_retry_count;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Resolve how this job is fired.
    ///
    /// Does not parse cron expressions; that is left to the trigger layer.
    pub fn schedule_kind(&self) -> Result<ScheduleKind, ValidationError> {
        let schedule = self
            .schedule
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (schedule, self.interval) {
            (Some(CHAIN_SCHEDULE), None) => Ok(ScheduleKind::Chain),
            (Some(_), Some(_)) => Err(ValidationError::AmbiguousSchedule(self.job_id.clone())),
            (Some(expr), None) => Ok(ScheduleKind::Cron(expr.to_string())),
            (None, Some(0)) => Err(ValidationError::InvalidInterval(self.job_id.clone())),
            (None, Some(ms)) => Ok(ScheduleKind::Interval(Duration::from_millis(ms))),
            (None, None) => Err(ValidationError::MissingSchedule(self.job_id.clone())),
        }
    }

    /// Structural validation: identifiers, schedule shape and handler reference.
    pub fn validate(&self) -> Result<ScheduleKind, ValidationError> {
        if self.job_id.trim().is_empty() {
            return Err(ValidationError::MissingJobId);
        }
        let kind = self.schedule_kind()?;
        if self.mdl.trim().is_empty() {
            return Err(ValidationError::MissingModule(self.job_id.clone()));
        }
        if self.function.trim().is_empty() {
            return Err(ValidationError::MissingFunction(self.job_id.clone()));
        }
        if self.successors.iter().any(|s| s.job_id.trim().is_empty()) {
            return Err(ValidationError::InvalidSuccessor(self.job_id.clone()));
        }
        Ok(kind)
    }

    pub fn is_chain(&self) -> bool {
        self.schedule.as_deref() == Some(CHAIN_SCHEDULE)
    }
}

impl Record for Job {
    const COLLECTION: &'static str = "Job";

    fn record_id(&self) -> &str {
        &self.job_id
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
