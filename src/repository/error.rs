// ==========================================
// Crane Allocation Ledger - repository error type
// ==========================================
// thiserror derive; rusqlite errors are classified here so the layers
// above never pattern-match on SQLite message strings.
// ==========================================

use thiserror::Error;

/// Repository-layer error type
#[derive(Error, Debug)]
pub enum RepositoryError {
    // ===== database errors =====
    #[error("record not found: {entity} with id={id}")]
    NotFound { entity: String, id: String },

    #[error("database connection failed: {0}")]
    DatabaseConnectionError(String),

    #[error("database lock acquisition failed: {0}")]
    LockError(String),

    #[error("database transaction failed: {0}")]
    DatabaseTransactionError(String),

    #[error("database query failed: {0}")]
    DatabaseQueryError(String),

    #[error("database busy: {0}")]
    DatabaseBusy(String),

    #[error("unique constraint violation: {0}")]
    UniqueConstraintViolation(String),

    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    // ===== business rule errors =====
    #[error("business rule violation: {0}")]
    BusinessRuleViolation(String),

    #[error("invalid state transition: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ===== data quality errors =====
    #[error("validation failed: {0}")]
    ValidationError(String),

    // ===== generic =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, Some(msg)) => {
                if msg.contains("UNIQUE") {
                    RepositoryError::UniqueConstraintViolation(msg)
                } else if msg.contains("FOREIGN KEY") {
                    RepositoryError::ForeignKeyViolation(msg)
                } else if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked
                {
                    RepositoryError::DatabaseBusy(msg)
                } else {
                    RepositoryError::DatabaseQueryError(msg)
                }
            }
            rusqlite::Error::SqliteFailure(code, None)
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                RepositoryError::DatabaseBusy(code.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "Unknown".to_string(),
                id: "Unknown".to_string(),
            },
            _ => RepositoryError::DatabaseQueryError(err.to_string()),
        }
    }
}

impl RepositoryError {
    /// Transient store failures worth a bounded retry. Everything else
    /// (not-found, constraint violations, validation) is final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RepositoryError::DatabaseBusy(_) | RepositoryError::LockError(_)
        )
    }
}

/// Result alias
pub type RepositoryResult<T> = Result<T, RepositoryError>;
