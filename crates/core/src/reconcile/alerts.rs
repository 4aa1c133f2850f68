//! Budget monitoring notices.
//!
//! Decides when users are warned besides the enable/disable notices: an
//! approval window closing, usage above the allocation, usage crossing a
//! share of the allocation, and changes to the provider's snapshot.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::summary::{RoleAssignment, SubscriptionState, SubscriptionSummary};

/// Days before expiry at which a new warning window opens, tightest first.
pub const EXPIRY_WARNING_DAYS: [i64; 3] = [1, 7, 30];

/// Shares of the allocation whose crossing triggers a usage alert.
pub const USAGE_ALERT_THRESHOLDS: [Decimal; 4] = [
    Decimal::from_parts(50, 0, 0, false, 2),
    Decimal::from_parts(75, 0, 0, false, 2),
    Decimal::from_parts(90, 0, 0, false, 2),
    Decimal::from_parts(95, 0, 0, false, 2),
];

fn is_running(state: Option<SubscriptionState>) -> bool {
    matches!(
        state,
        Some(SubscriptionState::Enabled | SubscriptionState::PastDue)
    )
}

// ============================================================================
// Expiry and over-budget warnings
// ============================================================================

/// Whether an expiry warning is due for a running subscription.
///
/// Windows open 30, 7 and 1 days before `expiry`; a warning is due when
/// none was sent since the innermost open window began. Once expired, a
/// subscription that is still enabled is warned daily.
#[must_use]
pub fn should_send_expiry_warning(
    expiry: NaiveDate,
    last_warning: Option<NaiveDate>,
    state: Option<SubscriptionState>,
    today: NaiveDate,
) -> bool {
    if !is_running(state) {
        return false;
    }

    if expiry < today {
        return state == Some(SubscriptionState::Enabled)
            && last_warning.is_none_or(|last| last < today);
    }

    EXPIRY_WARNING_DAYS.iter().any(|&days| {
        expiry <= today + Duration::days(days)
            && last_warning.is_none_or(|last| last < expiry - Duration::days(days))
    })
}

/// Usage as a percentage of the allocation, to two places. `None` when
/// nothing is allocated.
#[must_use]
pub fn percentage_used(allocated: Decimal, total_cost: Decimal) -> Option<Decimal> {
    total_cost
        .checked_div(allocated)?
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|p| p.round_dp(2).normalize())
}

/// A due over-budget warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverBudgetWarning {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Share of the allocation spent, `None` when nothing is allocated.
    pub percentage_used: Option<Decimal>,
}

/// A running subscription spending beyond its allocation is warned at most
/// once a day, counting any earlier warning sent that day.
#[must_use]
pub fn over_budget_warning(
    summary: &SubscriptionSummary,
    last_warning: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<OverBudgetWarning> {
    let due = summary.total_cost > summary.allocated
        && is_running(summary.state)
        && last_warning.is_none_or(|last| last < today);

    due.then(|| OverBudgetWarning {
        subscription_id: summary.subscription_id,
        percentage_used: percentage_used(summary.allocated, summary.total_cost),
    })
}

// ============================================================================
// Usage thresholds
// ============================================================================

/// A usage threshold newly crossed by an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageAlert {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Threshold crossed, in percent.
    pub percentage: Decimal,
}

fn has_reached(summary: &SubscriptionSummary, share: Decimal) -> bool {
    !summary.total_cost.is_zero() && summary.total_cost >= summary.allocated * share
}

/// Compares summaries taken before and after an upload.
///
/// A subscription is alerted for a threshold it reaches now but had not
/// reached before, provided it is still below the next threshold. With
/// nothing allocated, any spend reaches every threshold.
#[must_use]
pub fn usage_alerts(before: &[SubscriptionSummary], after: &[SubscriptionSummary]) -> Vec<UsageAlert> {
    let mut alerts = Vec::new();

    for (i, &lower) in USAGE_ALERT_THRESHOLDS.iter().enumerate() {
        let upper = USAGE_ALERT_THRESHOLDS.get(i + 1).copied();
        let already: HashSet<Uuid> = before
            .iter()
            .filter(|s| has_reached(s, lower))
            .map(|s| s.subscription_id)
            .collect();

        for summary in after {
            let below_upper = summary.allocated.is_zero()
                || upper.is_none_or(|upper| summary.total_cost < summary.allocated * upper);
            if has_reached(summary, lower)
                && below_upper
                && !already.contains(&summary.subscription_id)
            {
                alerts.push(UsageAlert {
                    subscription_id: summary.subscription_id,
                    percentage: (lower * Decimal::ONE_HUNDRED).normalize(),
                });
            }
        }
    }

    alerts
}

// ============================================================================
// Snapshot changes
// ============================================================================

/// A subscription as last reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// Display name.
    pub display_name: Option<String>,
    /// Reported state.
    pub state: SubscriptionState,
    /// Role assignments on the subscription.
    pub role_assignments: Vec<RoleAssignment>,
}

/// A role holder as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleHolder {
    /// Role name.
    pub role_name: String,
    /// Holder's display name.
    pub display_name: String,
    /// Holder's email address.
    pub mail: Option<String>,
}

impl From<&RoleAssignment> for RoleHolder {
    fn from(role: &RoleAssignment) -> Self {
        Self {
            role_name: role.role_name.clone(),
            display_name: role.display_name.clone(),
            mail: role.mail.clone(),
        }
    }
}

/// Notice owed to users after a new snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotNotice {
    /// First notice for the subscription.
    Welcome,
    /// Name or state changed.
    StatusChange {
        /// Previous snapshot's name.
        old_name: Option<String>,
        /// New name.
        new_name: Option<String>,
        /// Previous state.
        old_state: SubscriptionState,
        /// New state.
        new_state: SubscriptionState,
    },
    /// Role holders were added or removed.
    RolesChange {
        /// Holders only in the new snapshot.
        added: Vec<RoleHolder>,
        /// Holders only in the previous snapshot.
        removed: Vec<RoleHolder>,
    },
}

fn filtered_roles<'a>(
    snapshot: &'a SubscriptionSnapshot,
    roles_filter: &[String],
) -> Vec<&'a RoleAssignment> {
    snapshot
        .role_assignments
        .iter()
        .filter(|r| roles_filter.contains(&r.role_name))
        .collect()
}

fn holders(snapshot: &SubscriptionSnapshot) -> Vec<RoleHolder> {
    snapshot.role_assignments.iter().map(RoleHolder::from).collect()
}

/// Notices owed after `current` was recorded on top of `previous`.
///
/// A subscription never welcomed gets only the welcome. Otherwise changes
/// are reported when the name, the state, or the holders of a role in
/// `roles_filter` differ; the role notice then lists every holder added or
/// removed.
#[must_use]
pub fn snapshot_notices(
    previous: Option<&SubscriptionSnapshot>,
    current: &SubscriptionSnapshot,
    welcomed: bool,
    roles_filter: &[String],
) -> Vec<SnapshotNotice> {
    if !welcomed {
        return vec![SnapshotNotice::Welcome];
    }
    let Some(previous) = previous else {
        return Vec::new();
    };

    let unchanged = previous.display_name == current.display_name
        && previous.state == current.state
        && filtered_roles(previous, roles_filter) == filtered_roles(current, roles_filter);
    if unchanged {
        return Vec::new();
    }

    let mut notices = Vec::new();
    if previous.display_name != current.display_name || previous.state != current.state {
        notices.push(SnapshotNotice::StatusChange {
            old_name: previous.display_name.clone(),
            new_name: current.display_name.clone(),
            old_state: previous.state,
            new_state: current.state,
        });
    }

    let old = holders(previous);
    let new = holders(current);
    let removed: Vec<RoleHolder> = old.iter().filter(|h| !new.contains(h)).cloned().collect();
    let added: Vec<RoleHolder> = new.iter().filter(|h| !old.contains(h)).cloned().collect();
    if !added.is_empty() || !removed.is_empty() {
        notices.push(SnapshotNotice::RolesChange { added, removed });
    }

    notices
}
