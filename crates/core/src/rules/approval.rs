//! Approval rules.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use uuid::Uuid;

use budgetguard_shared::Currency;

use super::error::LedgerError;
use crate::summary::SubscriptionSummary;

/// How far back an unforced approval may start.
pub const FORCE_WINDOW_DAYS: i64 = 30;

/// A requested approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApproval {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Ticket reference.
    pub ticket: String,
    /// Signed amount; negative values reduce the budget.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
    /// Start of the approved period.
    pub date_from: NaiveDate,
    /// End of the approved period.
    pub date_to: NaiveDate,
    /// Also write a matching allocation.
    pub allocate: bool,
    /// Skip the start-date window check.
    pub force: bool,
}

impl NewApproval {
    /// Ticket recorded on the approval row.
    #[must_use]
    pub fn recorded_ticket(&self) -> String {
        if self.force {
            format!("{} (forced)", self.ticket)
        } else {
            self.ticket.clone()
        }
    }
}

/// Checks an approval against the subscription's summary.
///
/// # Errors
///
/// Returns the first rule the approval breaks.
pub fn check_approval(
    approval: &NewApproval,
    summary: &SubscriptionSummary,
    today: NaiveDate,
) -> Result<(), LedgerError> {
    if approval.date_to < today {
        return Err(LedgerError::DateToInPast(approval.date_to));
    }
    if approval.date_from > approval.date_to {
        return Err(LedgerError::InvertedRange {
            from: approval.date_from,
            to: approval.date_to,
        });
    }
    approval
        .currency
        .parse::<Currency>()
        .map_err(|_| LedgerError::UnsupportedCurrency(approval.currency.clone()))?;

    if approval.amount >= Decimal::ZERO {
        check_positive(approval, summary, today)
    } else {
        check_negative(approval, summary)
    }
}

fn check_positive(
    approval: &NewApproval,
    summary: &SubscriptionSummary,
    today: NaiveDate,
) -> Result<(), LedgerError> {
    if !approval.force && approval.date_from < today - Duration::days(FORCE_WINDOW_DAYS) {
        return Err(LedgerError::DateFromTooOld(approval.date_from));
    }

    if let Some(approved_to) = summary.approved_to {
        if approval.date_to < approved_to {
            return Err(LedgerError::EndsBeforeApproved {
                date_to: approval.date_to,
                approved_to,
            });
        }
        if approval.date_from > approved_to {
            return Err(LedgerError::StartsAfterApproved {
                date_from: approval.date_from,
                approved_to,
            });
        }
    }

    Ok(())
}

fn check_negative(approval: &NewApproval, summary: &SubscriptionSummary) -> Result<(), LedgerError> {
    let (Some(approved_from), Some(approved_to)) = (summary.approved_from, summary.approved_to)
    else {
        return Err(LedgerError::NoApprovals);
    };

    if approval.date_from != approved_from || approval.date_to != approved_to {
        return Err(LedgerError::RangeMismatch {
            from: approval.date_from,
            to: approval.date_to,
            approved_from,
            approved_to,
        });
    }

    let reduction = approval.amount.abs();

    let unused = summary.approved - summary.total_cost;
    if unused < reduction {
        return Err(LedgerError::ExceedsUnused {
            unused,
            amount: reduction,
        });
    }

    let mut unallocated = summary.approved - summary.allocated;
    if approval.allocate {
        unallocated -= approval.amount;
    }
    if unallocated < reduction {
        return Err(LedgerError::ExceedsUnallocated {
            unallocated,
            amount: reduction,
        });
    }

    Ok(())
}
