//! Budget warnings.
//!
//! Expiry and over-budget warnings are rate limited by the latest matching
//! row in `emails`: expiry warnings by the last expiry warning, over-budget
//! warnings by the last warning of any kind. Only delivered notices are
//! recorded there, so a failed one is retried on the next check.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::info;
use uuid::Uuid;

use budgetguard_core::reconcile::{
    SnapshotNotice, UsageAlert, over_budget_warning, should_send_expiry_warning,
};
use budgetguard_core::summary::{SubscriptionFilter, SubscriptionSummary};

use super::ROWS_PER_STATEMENT;
use super::summary::summarize_on;
use crate::entities::emails;
use crate::error::StoreResult;
use crate::notify::{
    EMAIL_TYPE_TIMEBASED, EMAIL_TYPE_WELCOME, Notification, Notifier, WARNING_EMAIL_TYPES,
};

/// Days before expiry from which approval windows are checked.
const EXPIRY_HORIZON_DAYS: i64 = 30;

/// Date of the latest email of one of `types` per subscription.
pub(crate) async fn latest_emails<C: ConnectionTrait>(
    conn: &C,
    types: &[&str],
    subscription_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, NaiveDate>> {
    let mut latest = HashMap::new();
    for chunk in subscription_ids.chunks(ROWS_PER_STATEMENT) {
        let rows: Vec<(Option<Uuid>, DateTimeWithTimeZone)> = emails::Entity::find()
            .select_only()
            .column(emails::Column::SubscriptionId)
            .column(emails::Column::CreatedAt)
            .distinct_on([emails::Column::SubscriptionId])
            .filter(emails::Column::EmailType.is_in(types.iter().copied()))
            .filter(emails::Column::SubscriptionId.is_in(chunk.iter().copied()))
            .order_by_asc(emails::Column::SubscriptionId)
            .order_by_desc(emails::Column::Id)
            .into_tuple()
            .all(conn)
            .await?;

        latest.extend(
            rows.into_iter()
                .filter_map(|(id, sent)| Some((id?, sent.with_timezone(&Utc).date_naive()))),
        );
    }
    Ok(latest)
}

/// Whether a subscription has ever been welcomed.
pub(crate) async fn is_welcomed<C: ConnectionTrait>(conn: &C, subscription_id: Uuid) -> StoreResult<bool> {
    Ok(latest_emails(conn, &[EMAIL_TYPE_WELCOME], &[subscription_id])
        .await?
        .contains_key(&subscription_id))
}

/// Warnings sent by one check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorReport {
    /// Subscriptions warned about their approval window.
    pub expiring: Vec<Uuid>,
    /// Subscriptions warned about spend beyond their allocation.
    pub over_budget: Vec<Uuid>,
}

/// Sends budget warnings.
#[derive(Clone)]
pub struct BudgetMonitor {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for BudgetMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetMonitor").finish_non_exhaustive()
    }
}

impl BudgetMonitor {
    /// Creates a monitor.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Sends the expiry and over-budget warnings due for the filtered
    /// subscriptions.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn check_budgets(&self, filter: &SubscriptionFilter) -> StoreResult<MonitorReport> {
        let summaries = summarize_on(&self.db, filter).await?;
        let today = Utc::now().date_naive();

        let report = MonitorReport {
            expiring: self.warn_expiring(&summaries, today).await?,
            // Runs second so that an expiry warning sent today counts.
            over_budget: self.warn_over_budget(&summaries, today).await?,
        };

        if !report.expiring.is_empty() || !report.over_budget.is_empty() {
            info!(
                expiring = report.expiring.len(),
                over_budget = report.over_budget.len(),
                "Sent budget warnings"
            );
        }
        Ok(report)
    }

    async fn warn_expiring(
        &self,
        summaries: &[SubscriptionSummary],
        today: NaiveDate,
    ) -> StoreResult<Vec<Uuid>> {
        let horizon = today + Duration::days(EXPIRY_HORIZON_DAYS);
        let candidates: Vec<(Uuid, NaiveDate, &SubscriptionSummary)> = summaries
            .iter()
            .filter_map(|s| Some((s.subscription_id, s.approved_to?, s)))
            .filter(|(_, expiry, _)| *expiry <= horizon)
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = candidates.iter().map(|(id, _, _)| *id).collect();
        let last = latest_emails(&self.db, &[EMAIL_TYPE_TIMEBASED], &ids).await?;

        let mut warned = Vec::new();
        for (id, expiry, summary) in candidates {
            if should_send_expiry_warning(expiry, last.get(&id).copied(), summary.state, today) {
                let days = (expiry - today).num_days();
                self.notifier.notify(Notification::expiry_looming(id, days)).await;
                warned.push(id);
            }
        }
        Ok(warned)
    }

    async fn warn_over_budget(
        &self,
        summaries: &[SubscriptionSummary],
        today: NaiveDate,
    ) -> StoreResult<Vec<Uuid>> {
        let candidates: Vec<&SubscriptionSummary> = summaries
            .iter()
            .filter(|s| s.total_cost > s.allocated)
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = candidates.iter().map(|s| s.subscription_id).collect();
        let last = latest_emails(&self.db, &WARNING_EMAIL_TYPES, &ids).await?;

        let mut warned = Vec::new();
        for summary in candidates {
            let last_warning = last.get(&summary.subscription_id).copied();
            if let Some(warning) = over_budget_warning(summary, last_warning, today) {
                self.notifier.notify(Notification::over_budget(warning)).await;
                warned.push(summary.subscription_id);
            }
        }
        Ok(warned)
    }

    /// Sends usage threshold alerts.
    pub async fn send_usage_alerts(&self, alerts: &[UsageAlert]) {
        for alert in alerts {
            self.notifier.notify(Notification::usage_alert(*alert)).await;
        }
        if !alerts.is_empty() {
            info!(alerts = alerts.len(), "Sent usage alerts");
        }
    }

    /// Sends the notices owed after a new snapshot.
    pub async fn send_snapshot_notices(&self, subscription_id: Uuid, notices: &[SnapshotNotice]) {
        for notice in notices {
            self.notifier
                .notify(Notification::snapshot(subscription_id, notice))
                .await;
        }
    }
}
