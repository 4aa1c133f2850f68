//! Joins per-table aggregates into summaries.

use std::collections::HashMap;

use uuid::Uuid;

use super::types::{
    AllocationTotals, ApprovalTotals, LatestDetails, LatestPersistence, LatestStatus,
    SubscriptionRow, SubscriptionSummary, UsageTotals,
};

/// Aggregates fetched for one filter.
#[derive(Debug, Clone, Default)]
pub struct SummaryParts {
    /// Subscriptions to summarize, in output order.
    pub subscriptions: Vec<SubscriptionRow>,
    /// Approval aggregates.
    pub approvals: Vec<ApprovalTotals>,
    /// Allocation aggregates.
    pub allocations: Vec<AllocationTotals>,
    /// Usage rollups.
    pub usage: Vec<UsageTotals>,
    /// Latest persistence rows.
    pub persistence: Vec<LatestPersistence>,
    /// Latest status rows.
    pub statuses: Vec<LatestStatus>,
    /// Latest external snapshots.
    pub details: Vec<LatestDetails>,
}

fn by_id<T>(rows: Vec<T>, key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, T> {
    rows.into_iter().map(|row| (key(&row), row)).collect()
}

/// Left-joins every aggregate onto the subscription list.
///
/// Subscriptions without rows in a table keep zero sums and `None` fields.
/// Aggregates for subscriptions not in `parts.subscriptions` are ignored.
#[must_use]
pub fn merge(parts: SummaryParts) -> Vec<SubscriptionSummary> {
    let mut approvals = by_id(parts.approvals, |r| r.subscription_id);
    let mut allocations = by_id(parts.allocations, |r| r.subscription_id);
    let mut usage = by_id(parts.usage, |r| r.subscription_id);
    let persistence = by_id(parts.persistence, |r| r.subscription_id);
    let statuses = by_id(parts.statuses, |r| r.subscription_id);
    let mut details = by_id(parts.details, |r| r.subscription_id);

    parts
        .subscriptions
        .into_iter()
        .map(|sub| {
            let id = sub.subscription_id;
            let mut summary = SubscriptionSummary::empty(id);
            summary.abolished = sub.abolished;

            if let Some(row) = approvals.remove(&id) {
                summary.approved_from = row.approved_from;
                summary.approved_to = row.approved_to;
                summary.approved = row.approved;
            }
            if let Some(row) = allocations.remove(&id) {
                summary.allocated = row.allocated;
            }
            if let Some(row) = usage.remove(&id) {
                summary.first_usage = row.first_usage;
                summary.latest_usage = row.latest_usage;
                summary.cost = row.cost;
                summary.amortised_cost = row.amortised_cost;
                summary.total_cost = row.total_cost;
            }
            if let Some(row) = persistence.get(&id) {
                summary.always_on = Some(row.always_on);
            }
            if let Some(row) = statuses.get(&id) {
                summary.desired_status = Some(row.active);
                summary.desired_status_info = row.reason;
            }
            if let Some(row) = details.remove(&id) {
                summary.name = row.display_name;
                summary.state = row.state;
            }
            summary
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::BillingStatus;
    use crate::summary::SubscriptionState;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn sub(id: Uuid) -> SubscriptionRow {
        SubscriptionRow {
            subscription_id: id,
            abolished: false,
        }
    }

    #[test]
    fn test_merge_defaults_to_zero() {
        let id = Uuid::new_v4();
        let summaries = merge(SummaryParts {
            subscriptions: vec![sub(id)],
            ..SummaryParts::default()
        });

        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.approved, Decimal::ZERO);
        assert_eq!(summary.allocated, Decimal::ZERO);
        assert_eq!(summary.total_cost, Decimal::ZERO);
        assert_eq!(summary.always_on, None);
        assert_eq!(summary.desired_status, None);
    }

    #[test]
    fn test_merge_joins_by_subscription() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();

        let summaries = merge(SummaryParts {
            subscriptions: vec![sub(a), sub(b)],
            approvals: vec![ApprovalTotals {
                subscription_id: b,
                approved_from: Some(from),
                approved_to: Some(to),
                approved: dec!(500),
            }],
            allocations: vec![AllocationTotals {
                subscription_id: b,
                allocated: dec!(300),
            }],
            usage: vec![UsageTotals {
                subscription_id: a,
                first_usage: Some(from),
                latest_usage: Some(from),
                cost: dec!(10),
                amortised_cost: dec!(0),
                total_cost: dec!(10),
            }],
            persistence: vec![LatestPersistence {
                subscription_id: a,
                always_on: true,
            }],
            statuses: vec![LatestStatus {
                subscription_id: b,
                active: false,
                reason: Some(BillingStatus::Expired),
            }],
            details: vec![LatestDetails {
                subscription_id: b,
                display_name: Some("research".to_string()),
                state: Some(SubscriptionState::Disabled),
            }],
        });

        assert_eq!(summaries[0].subscription_id, a);
        assert_eq!(summaries[0].total_cost, dec!(10));
        assert_eq!(summaries[0].always_on, Some(true));
        assert_eq!(summaries[0].approved, Decimal::ZERO);

        assert_eq!(summaries[1].approved, dec!(500));
        assert_eq!(summaries[1].approved_to, Some(to));
        assert_eq!(summaries[1].remaining(), dec!(300));
        assert_eq!(summaries[1].desired_status, Some(false));
        assert_eq!(summaries[1].desired_status_info, Some(BillingStatus::Expired));
        assert_eq!(summaries[1].name.as_deref(), Some("research"));
    }

    #[test]
    fn test_merge_ignores_unlisted_subscriptions() {
        let listed = Uuid::new_v4();
        let summaries = merge(SummaryParts {
            subscriptions: vec![sub(listed)],
            allocations: vec![AllocationTotals {
                subscription_id: Uuid::new_v4(),
                allocated: dec!(1),
            }],
            ..SummaryParts::default()
        });
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].allocated, Decimal::ZERO);
    }
}
