//! Allocation rules.

use rust_decimal::Decimal;
use uuid::Uuid;

use budgetguard_shared::Currency;

use super::error::LedgerError;
use crate::summary::SubscriptionSummary;

/// A requested allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAllocation {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Ticket reference.
    pub ticket: String,
    /// Signed amount; negative values return budget to the approval.
    pub amount: Decimal,
    /// Currency code.
    pub currency: String,
}

/// Checks an allocation against the subscription's summary.
///
/// # Errors
///
/// Returns the first rule the allocation breaks.
pub fn check_allocation(
    allocation: &NewAllocation,
    summary: &SubscriptionSummary,
) -> Result<(), LedgerError> {
    if summary.approved_to.is_none() {
        return Err(LedgerError::NoApprovals);
    }
    allocation
        .currency
        .parse::<Currency>()
        .map_err(|_| LedgerError::UnsupportedCurrency(allocation.currency.clone()))?;

    if allocation.amount.is_zero() {
        return Err(LedgerError::ZeroAllocation);
    }

    if allocation.amount > Decimal::ZERO {
        let unallocated = summary.approved - summary.allocated;
        if allocation.amount > unallocated {
            return Err(LedgerError::ExceedsUnallocated {
                unallocated,
                amount: allocation.amount,
            });
        }
    } else {
        let unused = summary.remaining();
        if allocation.amount.abs() > unused {
            return Err(LedgerError::ExceedsUnused {
                unused,
                amount: allocation.amount.abs(),
            });
        }
    }

    Ok(())
}
