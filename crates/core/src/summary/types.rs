//! Summary domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reconcile::BillingStatus;

/// Which subscriptions an aggregate covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SubscriptionFilter {
    /// Every subscription.
    #[default]
    All,
    /// A single subscription.
    One(Uuid),
    /// An explicit set of subscriptions.
    Many(Vec<Uuid>),
}

impl SubscriptionFilter {
    /// Builds a filter from an optional id list, `None` meaning all.
    #[must_use]
    pub fn from_ids(ids: Option<&[Uuid]>) -> Self {
        match ids {
            None => Self::All,
            Some([id]) => Self::One(*id),
            Some(ids) => Self::Many(ids.to_vec()),
        }
    }

    /// The ids the filter is restricted to, `None` when unrestricted.
    #[must_use]
    pub fn ids(&self) -> Option<Vec<Uuid>> {
        match self {
            Self::All => None,
            Self::One(id) => Some(vec![*id]),
            Self::Many(ids) => Some(ids.clone()),
        }
    }

    /// Returns true if the filter can match nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Many(ids) if ids.is_empty())
    }
}

/// Externally reported state of a cloud subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionState {
    /// Running normally.
    Enabled,
    /// Turned off.
    Disabled,
    /// Flagged by the provider.
    Warned,
    /// Payment overdue.
    PastDue,
    /// Reached its end date.
    Expired,
    /// Removed.
    Deleted,
}

impl SubscriptionState {
    /// Name as reported by the provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enabled => "Enabled",
            Self::Disabled => "Disabled",
            Self::Warned => "Warned",
            Self::PastDue => "PastDue",
            Self::Expired => "Expired",
            Self::Deleted => "Deleted",
        }
    }
}

impl std::fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Enabled" => Ok(Self::Enabled),
            "Disabled" => Ok(Self::Disabled),
            "Warned" => Ok(Self::Warned),
            "PastDue" => Ok(Self::PastDue),
            "Expired" => Ok(Self::Expired),
            "Deleted" => Ok(Self::Deleted),
            _ => Err(format!("Unknown subscription state: {s}")),
        }
    }
}

/// A role held on a cloud subscription, as reported in its snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleAssignment {
    /// Provider id of the role definition.
    pub role_definition_id: String,
    /// Role name, e.g. `Contributor`.
    pub role_name: String,
    /// Provider id of the holder.
    pub principal_id: String,
    /// Holder's display name.
    pub display_name: String,
    /// Holder's email address.
    pub mail: Option<String>,
    /// Resource scope the role applies to.
    pub scope: Option<String>,
}

/// One row of the subscription table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionRow {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Whether the subscription has been abolished.
    pub abolished: bool,
}

/// Approval aggregate for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalTotals {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Earliest approval start.
    pub approved_from: Option<NaiveDate>,
    /// Latest approval end.
    pub approved_to: Option<NaiveDate>,
    /// Signed sum of approvals.
    pub approved: Decimal,
}

/// Allocation aggregate for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTotals {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Signed sum of allocations.
    pub allocated: Decimal,
}

/// Usage rollup for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageTotals {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// First day with usage.
    pub first_usage: Option<NaiveDate>,
    /// Last day with usage.
    pub latest_usage: Option<NaiveDate>,
    /// Sum of `cost`.
    pub cost: Decimal,
    /// Sum of `amortised_cost`.
    pub amortised_cost: Decimal,
    /// Sum of `total_cost`.
    pub total_cost: Decimal,
}

/// Latest persistence row for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestPersistence {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Whether the subscription is exempt from expiry.
    pub always_on: bool,
}

/// Latest status row for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestStatus {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Desired enabled flag.
    pub active: bool,
    /// Why the subscription is disabled.
    pub reason: Option<BillingStatus>,
}

/// Latest external snapshot for one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestDetails {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Display name.
    pub display_name: Option<String>,
    /// Reported state.
    pub state: Option<SubscriptionState>,
}

/// Budget summary for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionSummary {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Display name from the latest snapshot.
    pub name: Option<String>,
    /// External state from the latest snapshot.
    pub state: Option<SubscriptionState>,
    /// Earliest approval start.
    pub approved_from: Option<NaiveDate>,
    /// Latest approval end.
    pub approved_to: Option<NaiveDate>,
    /// Signed sum of approvals.
    pub approved: Decimal,
    /// Signed sum of allocations.
    pub allocated: Decimal,
    /// Raw usage cost.
    pub cost: Decimal,
    /// Amortised usage cost.
    pub amortised_cost: Decimal,
    /// Cost the budget is measured against.
    pub total_cost: Decimal,
    /// First day with usage.
    pub first_usage: Option<NaiveDate>,
    /// Last day with usage.
    pub latest_usage: Option<NaiveDate>,
    /// Latest persistence flag, `None` when never set.
    pub always_on: Option<bool>,
    /// Whether the subscription has been abolished.
    pub abolished: bool,
    /// Latest desired enabled flag, `None` when never decided.
    pub desired_status: Option<bool>,
    /// Latest disable reason.
    pub desired_status_info: Option<BillingStatus>,
}

impl SubscriptionSummary {
    /// Creates an empty summary with all sums at zero.
    #[must_use]
    pub fn empty(subscription_id: Uuid) -> Self {
        Self {
            subscription_id,
            name: None,
            state: None,
            approved_from: None,
            approved_to: None,
            approved: Decimal::ZERO,
            allocated: Decimal::ZERO,
            cost: Decimal::ZERO,
            amortised_cost: Decimal::ZERO,
            total_cost: Decimal::ZERO,
            first_usage: None,
            latest_usage: None,
            always_on: None,
            abolished: false,
            desired_status: None,
            desired_status_info: None,
        }
    }

    /// Allocated budget not yet spent.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.allocated - self.total_cost
    }

    /// Returns true if the persistence flag exempts it from expiry.
    #[must_use]
    pub fn is_always_on(&self) -> bool {
        self.always_on.unwrap_or(false)
    }
}
