//! Core errors.

use cronrelay_protocols::{StoreError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Handler already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Handler not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Job validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
