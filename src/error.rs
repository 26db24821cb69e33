use thiserror::Error;

use crate::db::DatabaseError;

/// Failure taxonomy shared by every service operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    InvalidInput(String),

    /// Rejected by the store. Carries the store's message verbatim.
    #[error("{0}")]
    ValidationFailed(String),

    #[error("{0}")]
    NotFound(String),

    #[error("This slot has already been booked")]
    SlotUnavailable,

    #[error("{0}")]
    Forbidden(String),

    #[error("Consent is required before joining this consultation")]
    ConsentRequired,

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated("Authentication required".into())
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConstraintViolation(msg) => Self::ValidationFailed(msg),
            DatabaseError::NotFound { entity_type, id } => {
                Self::NotFound(format!("{entity_type} not found: {id}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Task join error: {err}"))
    }
}
