//! Error type shared by the repositories.

use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

use budgetguard_core::recovery::RecoveryError;
use budgetguard_core::rules::LedgerError;
use budgetguard_shared::AppError;

/// Result alias for repository operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by repositories and the lock manager.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A ledger write broke a business rule.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A recovery month was refused.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    /// Input rejected before touching the store.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested row does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate row, held lock, or a referenced row.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The lock store failed while acquiring.
    #[error("Lock unavailable: {0}")]
    LockUnavailable(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                Self::Conflict(format!("Referenced row exists: {detail}"))
            }
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                Self::Conflict(format!("Duplicate entry: {detail}"))
            }
            _ => Self::Database(err),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Ledger(e) => e.into(),
            StoreError::Recovery(e) => e.into(),
            StoreError::Validation(msg) => Self::Validation(msg),
            StoreError::NotFound(msg) => Self::NotFound(msg),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::LockUnavailable(msg) => Self::LockAcquisition(msg),
            StoreError::Database(e) => Self::Database(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use budgetguard_core::recovery::RecoveryMonth;

    #[test]
    fn test_recovery_error_is_validation() {
        let err = StoreError::from(RecoveryError::UnexpectedMonth {
            expected: RecoveryMonth::from_ym(2001, 2).unwrap(),
        });
        let app = AppError::from(err);
        assert_eq!(app.status_code(), 400);
        assert_eq!(app.detail(), "Expected 2001-02");
    }

    #[test]
    fn test_lock_errors_map_to_503_and_409() {
        assert_eq!(
            AppError::from(StoreError::LockUnavailable("pool closed".into())).status_code(),
            503
        );
        assert_eq!(
            AppError::from(StoreError::Conflict("held".into())).status_code(),
            409
        );
    }

    #[test]
    fn test_plain_db_error_stays_database() {
        let err = StoreError::from(DbErr::Custom("boom".into()));
        assert!(matches!(err, StoreError::Database(_)));
        assert_eq!(AppError::from(err).error_code(), "DATABASE_ERROR");
    }
}
