//! # CronRelay Protocols
//!
//! Core data model and protocol definitions for the CronRelay scheduler.
//! Contains only types and interface definitions - no implementations.
//!
//! ## Records
//!
//! - [`Job`] - A schedulable unit (cron, interval or chain)
//! - [`JobExecution`] - One firing of a job, tracked through [`ExecutionState`]
//! - [`JobRunner`] - A registered worker process
//!
//! ## Core Traits
//!
//! - [`RecordStore`] - Filterable CRUD store over any [`Record`]
//! - [`LeaderGate`] / [`LeadershipListener`] - Leader election collaborator
//! - [`JobHandler`] - Business logic invoked on a runner
//! - [`ExecutionStatus`] - Progress reporting used by running job code

pub mod error;
pub mod handler;
pub mod leader;
pub mod store;
pub mod types;

pub use error::{HandlerError, StatusError, StoreError, ValidationError};
pub use handler::{ExecutionStatus, JobContext, JobHandler};
pub use leader::{LeaderGate, LeadershipListener};
pub use store::{Condition, Filter, Op, Patch, Record, RecordStore};
pub use types::*;
