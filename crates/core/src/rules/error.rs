//! Ledger validation errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use budgetguard_shared::AppError;

/// Reasons a ledger write is refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Dates ==========
    /// Approval would end before today.
    #[error("Date to ({0}) cannot be in the past")]
    DateToInPast(NaiveDate),

    /// Start after end.
    #[error("Date from ({from}) cannot be greater than date to ({to})")]
    InvertedRange {
        /// Start date.
        from: NaiveDate,
        /// End date.
        to: NaiveDate,
    },

    /// Unforced approval starting too long ago.
    #[error("Date from ({0}) cannot be more than 30 days in the past")]
    DateFromTooOld(NaiveDate),

    /// Approval would end before the existing approval.
    #[error("Date to ({date_to}) should be equal or greater than ({approved_to})")]
    EndsBeforeApproved {
        /// Requested end.
        date_to: NaiveDate,
        /// Existing end.
        approved_to: NaiveDate,
    },

    /// Approval would start after the existing approval ends.
    #[error("Date from ({date_from}) should be equal or less than ({approved_to})")]
    StartsAfterApproved {
        /// Requested start.
        date_from: NaiveDate,
        /// Existing end.
        approved_to: NaiveDate,
    },

    /// Negative approval dates differ from the approved range.
    #[error(
        "Dates from and to ({from} - {to}) must align with the approval period ({approved_from} - {approved_to})"
    )]
    RangeMismatch {
        /// Requested start.
        from: NaiveDate,
        /// Requested end.
        to: NaiveDate,
        /// Existing start.
        approved_from: NaiveDate,
        /// Existing end.
        approved_to: NaiveDate,
    },

    // ========== Amounts ==========
    /// Currency other than GBP.
    #[error("Only GBP is supported, got {0}")]
    UnsupportedCurrency(String),

    /// Budget change on a subscription that was never approved.
    #[error("Subscription doesn't have any approvals")]
    NoApprovals,

    /// Zero-valued allocation.
    #[error("Allocation cannot be equal to zero")]
    ZeroAllocation,

    /// Reduction larger than what has not been spent.
    #[error("The unused budget ({unused}) is less than the reduction ({amount})")]
    ExceedsUnused {
        /// Budget not yet spent.
        unused: Decimal,
        /// Requested reduction.
        amount: Decimal,
    },

    /// Allocation or reduction larger than what has not been allocated.
    #[error("The unallocated budget ({unallocated}) is less than the amount ({amount})")]
    ExceedsUnallocated {
        /// Approved budget not yet allocated.
        unallocated: Decimal,
        /// Requested amount.
        amount: Decimal,
    },

    /// Negative finance amount.
    #[error("Amount should not be negative but was {0}")]
    NegativeAmount(Decimal),

    // ========== Finance ==========
    /// Finance period starting in an already recovered month.
    #[error(
        "Costs have already been recovered until {until} for subscription {subscription_id}, choose a later start date"
    )]
    AlreadyRecovered {
        /// Last recovered month.
        until: NaiveDate,
        /// Subscription id.
        subscription_id: Uuid,
    },

    /// Updated finance period does not end after it starts.
    #[error("Date to ({to}) must be after date from ({from})")]
    EmptyPeriod {
        /// Start date.
        from: NaiveDate,
        /// End date.
        to: NaiveDate,
    },

    /// Update would move a finance row to another subscription.
    #[error("Subscription IDs should match")]
    SubscriptionMismatch,

    /// Update would move a boundary across recovered months.
    #[error("{0} has been recovered")]
    RecoveredBoundary(&'static str),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        Self::Validation(err.to_string())
    }
}
