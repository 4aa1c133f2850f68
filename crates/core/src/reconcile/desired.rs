//! Mismatches between the desired status and the external state.

use serde::Serialize;
use uuid::Uuid;

use crate::summary::{SubscriptionState, SubscriptionSummary};

/// A subscription the controller still has to switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingChange {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// `Enabled` or `Disabled`.
    pub target: SubscriptionState,
}

/// Returns the state the subscription should be switched to, if any.
#[must_use]
pub fn pending_change(summary: &SubscriptionSummary) -> Option<PendingChange> {
    let target = match (summary.desired_status, summary.state?) {
        (Some(false), SubscriptionState::Enabled | SubscriptionState::PastDue) => {
            SubscriptionState::Disabled
        }
        (
            Some(true),
            SubscriptionState::Disabled | SubscriptionState::Warned | SubscriptionState::Expired,
        ) => SubscriptionState::Enabled,
        _ => return None,
    };

    Some(PendingChange {
        subscription_id: summary.subscription_id,
        target,
    })
}
