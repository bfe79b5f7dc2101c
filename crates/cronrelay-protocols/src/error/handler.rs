//! Job handler errors.

use thiserror::Error;

/// Error returned by a job handler's `run`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Status reporting failed: {0}")]
    Status(#[from] super::StatusError),
}
