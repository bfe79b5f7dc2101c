//! Registered runner record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::store::Record;

/// A worker process able to execute job handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRunner {
    #[serde(rename = "instanceID")]
    pub instance_id: String,

    pub hostname: String,

    pub port: u16,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub heartbeat_time: DateTime<Utc>,
}

impl JobRunner {
    pub fn new(instance_id: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            instance_id: instance_id.into(),
            hostname: hostname.into(),
            port,
            heartbeat_time: Utc::now(),
        }
    }

    /// Base URL the master uses to reach this runner.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.hostname, self.port)
    }

    /// `true` once the last heartbeat is older than `tolerance` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, tolerance: Duration) -> bool {
        self.heartbeat_time < now - tolerance
    }
}

impl Record for JobRunner {
    const COLLECTION: &'static str = "JobRunner";

    fn record_id(&self) -> &str {
        &self.instance_id
    }
}
