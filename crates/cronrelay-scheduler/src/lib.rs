//! # CronRelay Scheduler
//!
//! The scheduling, dispatch and failure-recovery engine.
//!
//! ## Master side (leader only)
//!
//! - [`JobScheduler`] - leadership lifecycle; builds a [`MasterEpoch`](scheduler::MasterEpoch) on `start()`
//! - [`ScheduleManager`] - arms cron/interval triggers for enabled jobs
//! - [`Dispatcher`] - round-robin runner selection, trigger call, bounded retry
//! - [`DefunctMonitor`] - stalled-execution and missed-cron sweeps
//! - [`RunnerRegistry`] - cached snapshot of live runners
//!
//! ## Any instance
//!
//! - [`RunnerAgent`] - registers this process as a runner and heartbeats
//! - [`JobRunnerEndpoint`] - resolves and invokes handlers for triggered executions
//! - [`ExecutionStatusApi`] - heartbeat/done/fail/skip and successor chaining

pub mod armed;
pub mod defunct_monitor;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod runner_agent;
pub mod runner_endpoint;
pub mod runner_registry;
pub mod schedule_manager;
pub mod scheduler;
pub mod status_api;
pub mod triggers;

#[cfg(test)]
mod test_support;

pub use armed::ArmedTriggers;
pub use defunct_monitor::DefunctMonitor;
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::SchedulerError;
pub use events::{EventBus, SchedulerEvent};
pub use runner_agent::RunnerAgent;
pub use runner_endpoint::{JobRunnerEndpoint, RunJobAck};
pub use runner_registry::RunnerRegistry;
pub use schedule_manager::ScheduleManager;
pub use scheduler::{JobScheduler, SchedulerStatus};
pub use status_api::ExecutionStatusApi;
pub use triggers::{CronTrigger, IntervalTrigger, TriggerSource};

/// Reason recorded when dispatch retries are exhausted.
pub const REASON_MAX_RETRY: &str = "Reached maxRetryCount";

/// Reason recorded when a stalled execution is re-dispatched.
pub const REASON_MISSED_HEARTBEAT: &str = "Missed Heartbeat";

/// Reason recorded when a stalled execution cannot be retried.
pub const REASON_NO_HEARTBEAT: &str = "No Heartbeat (and retry is disabled)";
