//! Finance record rules.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::error::LedgerError;
use crate::recovery::RecoveryMonth;

/// A finance record as written by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFinance {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Ticket reference.
    pub ticket: String,
    /// Fundable amount.
    pub amount: Decimal,
    /// Lower values are recovered first.
    pub priority: i32,
    /// Cost centre.
    pub finance_code: String,
    /// Start of the funded period.
    pub date_from: NaiveDate,
    /// End of the funded period.
    pub date_to: NaiveDate,
}

impl NewFinance {
    /// Widens the period to whole months.
    #[must_use]
    pub fn with_whole_months(mut self) -> Self {
        self.date_from = RecoveryMonth::containing(self.date_from).first_day();
        self.date_to = RecoveryMonth::containing(self.date_to).last_day();
        self
    }
}

/// Checks a new record, already widened to whole months.
///
/// `last_recovered` is the latest month already recovered for the
/// subscription.
///
/// # Errors
///
/// Returns the first rule the record breaks.
pub fn check_new_finance(
    finance: &NewFinance,
    last_recovered: Option<NaiveDate>,
) -> Result<(), LedgerError> {
    if finance.date_from > finance.date_to {
        return Err(LedgerError::InvertedRange {
            from: finance.date_from,
            to: finance.date_to,
        });
    }
    if finance.amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(finance.amount));
    }
    if let Some(until) = last_recovered
        && finance.date_from <= until
    {
        return Err(LedgerError::AlreadyRecovered {
            until,
            subscription_id: finance.subscription_id,
        });
    }
    Ok(())
}

/// Checks an update of `old` into `new`.
///
/// `last_logged` is the latest committed recovery month. Boundaries may
/// only move while both their old and new positions are after it.
///
/// # Errors
///
/// Returns the first rule the update breaks.
pub fn check_finance_update(
    old: &NewFinance,
    new: &NewFinance,
    last_logged: Option<NaiveDate>,
) -> Result<(), LedgerError> {
    if new.date_to <= new.date_from {
        return Err(LedgerError::EmptyPeriod {
            from: new.date_from,
            to: new.date_to,
        });
    }
    if new.amount < Decimal::ZERO {
        return Err(LedgerError::NegativeAmount(new.amount));
    }
    if old.subscription_id != new.subscription_id {
        return Err(LedgerError::SubscriptionMismatch);
    }

    let Some(last) = last_logged else {
        return Ok(());
    };

    if new.date_from != old.date_from {
        if old.date_from <= last {
            return Err(LedgerError::RecoveredBoundary("old date_from"));
        }
        if new.date_from <= last {
            return Err(LedgerError::RecoveredBoundary("new date_from"));
        }
    }
    if new.date_to != old.date_to {
        if new.date_to <= last {
            return Err(LedgerError::RecoveredBoundary("new date_to"));
        }
        if old.date_to <= last {
            return Err(LedgerError::RecoveredBoundary("old date_to"));
        }
    }

    Ok(())
}
