//! Cost-recovery error types.

use chrono::NaiveDate;
use thiserror::Error;

use budgetguard_shared::AppError;

use super::month::RecoveryMonth;

/// Reasons a recovery month is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    /// Month is not given as its first day.
    #[error("Month must be the first day of a month, got {0}")]
    NotFirstOfMonth(NaiveDate),

    /// Committed months must follow the last committed month.
    #[error("Expected {expected}")]
    UnexpectedMonth {
        /// The only month that may be committed next.
        expected: RecoveryMonth,
    },

    /// Usage for the month may still change.
    #[error("Cannot recover later than {latest}")]
    TooLate {
        /// Latest month whose usage is final.
        latest: RecoveryMonth,
    },
}

impl From<RecoveryError> for AppError {
    fn from(err: RecoveryError) -> Self {
        Self::Validation(err.to_string())
    }
}
