//! Scheduler errors.

use cronrelay_core::CatalogError;
use cronrelay_protocols::{StatusError, StoreError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Job validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Trigger call failed: {0}")]
    Transport(String),

    #[error("Execution {0} stalled without heartbeat")]
    StaleExecution(String),

    #[error("Execution {0} failed by application")]
    ApplicationFailure(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No runner available")]
    NoRunnerAvailable,

    #[error("This instance is not the active scheduler leader")]
    NotLeader,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("No handler registered for {0}")]
    HandlerNotFound(String),
}

impl From<CatalogError> for SchedulerError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Validation(e) => SchedulerError::Validation(e),
            CatalogError::NotFound(id) => SchedulerError::JobNotFound(id),
            CatalogError::Store(e) => SchedulerError::Store(e),
        }
    }
}

impl From<SchedulerError> for StatusError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Store(e) => StatusError::Store(e),
            SchedulerError::ExecutionNotFound(id) => StatusError::ExecutionNotFound(id),
            other => StatusError::Remote(other.to_string()),
        }
    }
}
