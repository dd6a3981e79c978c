// ==========================================
// Crane Allocation Ledger - API error taxonomy
// ==========================================
// Every error a caller can see, with the repository layer's technical
// errors translated into caller-meaningful categories:
// - validation and not-found are never retried
// - conflicts go back to the caller for a decision (retrying blindly
//   could mask a real double-booking attempt)
// - only transient store failures are retryable, and only the transfer
//   path retries them, bounded
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API-layer error type
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or missing fields; rejected before any store access
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// Crane, site or allocation absent, or origin mismatch on transfer
    #[error("not found: {0}")]
    NotFound(String),

    /// Crane already occupied, overlapping window, or invalid transition
    #[error("conflict: {0}")]
    ConflictError(String),

    /// A downstream record (billing/measurement) blocks the operation
    #[error("dependency blocks operation: {0}")]
    DependencyError(String),

    /// Reconciliation detected a pointer/ledger mismatch
    #[error("inconsistency detected: {0}")]
    InconsistencyError(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    /// Transient store failure; eligible for bounded retry
    #[error("database busy: {0}")]
    DatabaseBusy(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={}) does not exist", entity, id))
            }
            // The partial unique index firing means a concurrent writer
            // won the crane; same meaning as the friendly pre-check.
            RepositoryError::UniqueConstraintViolation(msg) => ApiError::ConflictError(format!(
                "crane already has an active allocation: {}",
                msg
            )),
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::ValidationError(format!("referenced record does not exist: {}", msg))
            }
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::ConflictError(format!("invalid state transition: {} -> {}", from, to))
            }
            RepositoryError::BusinessRuleViolation(msg) => ApiError::ConflictError(msg),
            RepositoryError::ValidationError(msg) => ApiError::ValidationError(msg),
            RepositoryError::DatabaseBusy(msg) | RepositoryError::LockError(msg) => {
                ApiError::DatabaseBusy(msg)
            }
            RepositoryError::DatabaseConnectionError(msg)
            | RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl ApiError {
    /// Only transient store failures qualify for automatic retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::DatabaseBusy(_))
    }
}

/// Result alias
pub type ApiResult<T> = Result<T, ApiError>;
