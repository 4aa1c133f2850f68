//! Disable-reason classification.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::summary::SubscriptionSummary;

/// Tolerance below which budget differences are ignored (0.001).
pub const ADJUSTMENT_DELTA: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Reason recorded on a disabling status row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BillingStatus {
    /// The approval window has ended.
    Expired,
    /// Usage exceeds the allocated budget.
    OverBudget,
    /// Both of the above.
    OverBudgetAndExpired,
}

impl BillingStatus {
    /// Stored representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "EXPIRED",
            Self::OverBudget => "OVER_BUDGET",
            Self::OverBudgetAndExpired => "OVER_BUDGET_AND_EXPIRED",
        }
    }
}

impl std::fmt::Display for BillingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which disable conditions hold for a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisableReasons {
    /// Past the approval window.
    pub expired: bool,
    /// Spent more than allocated.
    pub over_budget: bool,
}

impl DisableReasons {
    /// Returns true if any condition holds.
    #[must_use]
    pub const fn any(self) -> bool {
        self.expired || self.over_budget
    }

    /// Combined reason, `None` when the subscription may stay enabled.
    #[must_use]
    pub const fn reason(self) -> Option<BillingStatus> {
        match (self.expired, self.over_budget) {
            (true, true) => Some(BillingStatus::OverBudgetAndExpired),
            (true, false) => Some(BillingStatus::Expired),
            (false, true) => Some(BillingStatus::OverBudget),
            (false, false) => None,
        }
    }
}

/// Approval window ended on or before `today` (or never existed), and the
/// subscription is not always on.
#[must_use]
pub fn is_expired(summary: &SubscriptionSummary, today: NaiveDate) -> bool {
    let window_over = summary.approved_to.is_none_or(|to| to <= today);
    window_over && !summary.is_always_on()
}

/// Usage exceeds allocation by more than [`ADJUSTMENT_DELTA`], and the
/// subscription is not always on.
#[must_use]
pub fn is_over_budget(summary: &SubscriptionSummary) -> bool {
    summary.allocated + ADJUSTMENT_DELTA < summary.total_cost && !summary.is_always_on()
}

/// Classifies one summary.
#[must_use]
pub fn classify(summary: &SubscriptionSummary, today: NaiveDate) -> DisableReasons {
    DisableReasons {
        expired: is_expired(summary, today),
        over_budget: is_over_budget(summary),
    }
}
