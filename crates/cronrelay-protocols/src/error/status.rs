//! Execution status reporting errors.

use thiserror::Error;

use super::StoreError;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Execution {execution_id} is no longer active (state {state})")]
    NotActive { execution_id: String, state: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Remote status call failed: {0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_active_display() {
        let err = StatusError::NotActive {
            execution_id: "abc".to_string(),
            state: "COMPLETED".to_string(),
        };
        let display = err.to_string();
        assert!(display.contains("abc"));
        assert!(display.contains("COMPLETED"));
    }

    #[test]
    fn test_from_store_error() {
        let err: StatusError = StoreError::StorageError("down".to_string()).into();
        assert!(matches!(err, StatusError::Store(_)));
    }
}
