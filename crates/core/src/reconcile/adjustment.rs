//! Budget clamping adjustments.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::classify::ADJUSTMENT_DELTA;
use crate::summary::SubscriptionSummary;

/// Ticket recorded on adjustments written for expired subscriptions.
pub const EXPIRY_ADJUSTMENT_MSG: &str = "Expiry adjustment";

/// Ticket recorded on adjustments written for abolished subscriptions.
pub const ABOLISHMENT_ADJUSTMENT_MSG: &str = "Abolishment adjustment";

/// Approval row to append, covering the existing approved range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalAdjustment {
    /// Signed amount.
    pub amount: Decimal,
    /// Start of the approved range.
    pub date_from: NaiveDate,
    /// End of the approved range.
    pub date_to: NaiveDate,
}

/// Allocation and approval rows to append for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetAdjustment {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Ticket text recorded on both rows.
    pub ticket: &'static str,
    /// Allocation amount, if an allocation row is needed.
    pub allocation: Option<Decimal>,
    /// Approval row, if one is needed.
    pub approval: Option<ApprovalAdjustment>,
}

impl BudgetAdjustment {
    /// Returns true if nothing needs writing.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.allocation.is_none() && self.approval.is_none()
    }
}

fn approval_row(summary: &SubscriptionSummary, amount: Decimal) -> Option<ApprovalAdjustment> {
    Some(ApprovalAdjustment {
        amount,
        date_from: summary.approved_from?,
        date_to: summary.approved_to?,
    })
}

/// Clamps unspent allocation and approval down to actual spend.
///
/// Never raises a budget. Returns `None` when neither exceeds `total_cost`
/// by at least [`ADJUSTMENT_DELTA`].
#[must_use]
pub fn expiry_adjustment(summary: &SubscriptionSummary) -> Option<BudgetAdjustment> {
    let allocation = (summary.allocated - summary.total_cost >= ADJUSTMENT_DELTA)
        .then(|| summary.total_cost - summary.allocated);

    let approval = if summary.approved - summary.total_cost >= ADJUSTMENT_DELTA {
        approval_row(summary, summary.total_cost - summary.approved)
    } else {
        None
    };

    let adjustment = BudgetAdjustment {
        subscription_id: summary.subscription_id,
        ticket: EXPIRY_ADJUSTMENT_MSG,
        allocation,
        approval,
    };
    (!adjustment.is_empty()).then_some(adjustment)
}

/// Line of the abolishment report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbolishmentAdjustment {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Display name.
    pub name: Option<String>,
    /// `total_cost - allocated`.
    pub allocation: Decimal,
    /// `total_cost - approved`.
    pub approval: Decimal,
}

/// Brings allocation and approval level with actual spend before abolishing.
///
/// Unlike [`expiry_adjustment`] this moves budgets in either direction, and
/// only for subscriptions that were ever approved. The report line is
/// produced regardless.
#[must_use]
pub fn abolishment_adjustment(
    summary: &SubscriptionSummary,
) -> (AbolishmentAdjustment, Option<BudgetAdjustment>) {
    let allocation_diff = summary.total_cost - summary.allocated;
    let approval_diff = summary.total_cost - summary.approved;

    let report = AbolishmentAdjustment {
        subscription_id: summary.subscription_id,
        name: summary.name.clone(),
        allocation: allocation_diff,
        approval: approval_diff,
    };

    if summary.approved_from.is_none() {
        return (report, None);
    }

    let adjustment = BudgetAdjustment {
        subscription_id: summary.subscription_id,
        ticket: ABOLISHMENT_ADJUSTMENT_MSG,
        allocation: (allocation_diff.abs() >= ADJUSTMENT_DELTA).then_some(allocation_diff),
        approval: if approval_diff.abs() >= ADJUSTMENT_DELTA {
            approval_row(summary, approval_diff)
        } else {
            None
        },
    };

    (report, (!adjustment.is_empty()).then_some(adjustment))
}
