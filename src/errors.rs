use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Error type returned by every public engine operation.
///
/// Errors are values, never panics: a failed operation is a no-op with no
/// partial side effects, so callers can surface the message and keep going.
#[derive(Error, Debug, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Order is locked: {0}")]
    LockedOrder(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status transition: {0}")]
    InvalidStatus(String),

    #[error("Core charge already processed for line {0}")]
    CoreAlreadyProcessed(Uuid),

    #[error("Blocked by inventory policy: {0}")]
    ValidationBlocked(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
