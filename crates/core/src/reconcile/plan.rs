//! Status rows a reconciliation pass writes.

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use super::adjustment::{BudgetAdjustment, expiry_adjustment};
use super::classify::{BillingStatus, classify, is_expired};
use crate::summary::SubscriptionSummary;

/// A status row to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DesiredStatusChange {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// New desired enabled flag.
    pub active: bool,
    /// Disable reason, `None` when enabling.
    pub reason: Option<BillingStatus>,
    /// Whether the subscription's users should be told.
    pub notify: bool,
}

/// Everything one pass has to write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Expiry adjustments, written first.
    pub adjustments: Vec<BudgetAdjustment>,
    /// Status rows to append.
    pub changes: Vec<DesiredStatusChange>,
}

impl ReconcilePlan {
    /// Disabling rows.
    pub fn disabled(&self) -> impl Iterator<Item = &DesiredStatusChange> {
        self.changes.iter().filter(|c| !c.active)
    }

    /// Enabling rows.
    pub fn enabled(&self) -> impl Iterator<Item = &DesiredStatusChange> {
        self.changes.iter().filter(|c| c.active)
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Subscriptions whose budgets were clamped.
    pub adjusted: Vec<Uuid>,
    /// Subscriptions given a new disabling status row.
    pub disabled: Vec<Uuid>,
    /// Subscriptions given a new enabling status row.
    pub enabled: Vec<Uuid>,
}

impl ReconcileReport {
    /// Returns true if the pass wrote nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adjusted.is_empty() && self.disabled.is_empty() && self.enabled.is_empty()
    }
}

/// Works out the writes for a batch of summaries.
///
/// Expired subscriptions are clamped whatever their final reason. A
/// disabling row is only planned when the decision differs from the latest
/// status row, and users are only notified the first time a reason is set.
/// Subscriptions with no reason to be disabled get an enabling row unless
/// they are already enabled.
#[must_use]
pub fn plan(summaries: &[SubscriptionSummary], today: NaiveDate) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();

    for summary in summaries {
        if is_expired(summary, today) {
            result.adjustments.extend(expiry_adjustment(summary));
        }

        let reasons = classify(summary, today);
        match reasons.reason() {
            Some(reason) => {
                let unchanged = summary.desired_status == Some(false)
                    && summary.desired_status_info == Some(reason);
                if !unchanged {
                    result.changes.push(DesiredStatusChange {
                        subscription_id: summary.subscription_id,
                        active: false,
                        reason: Some(reason),
                        notify: summary.desired_status_info.is_none(),
                    });
                }
            }
            None => {
                if summary.desired_status != Some(true) {
                    result.changes.push(DesiredStatusChange {
                        subscription_id: summary.subscription_id,
                        active: true,
                        reason: None,
                        notify: true,
                    });
                }
            }
        }
    }

    result
}
