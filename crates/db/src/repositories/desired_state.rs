//! Desired-state reconciliation.
//!
//! Compares every subscription's budget position with its latest desired
//! status, clamps expired budgets, and appends status rows only where the
//! decision changed. Runs without a lock: two concurrent passes over the
//! same subscriptions may both append the same row.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set, TransactionTrait};
use tracing::{info, warn};
use uuid::Uuid;

use budgetguard_core::reconcile::{
    DesiredStatusChange, PendingChange, ReconcileReport, pending_change, plan,
};
use budgetguard_core::summary::SubscriptionFilter;

use super::ROWS_PER_STATEMENT;
use super::budget::insert_adjustments;
use super::summary::summarize_on;
use crate::entities::status;
use crate::error::StoreResult;
use crate::notify::{Notification, Notifier};

/// Writes desired status rows and budget clamps.
#[derive(Clone)]
pub struct DesiredStateRepository {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for DesiredStateRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesiredStateRepository").finish_non_exhaustive()
    }
}

impl DesiredStateRepository {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self { db, notifier }
    }

    /// Reconciles the given subscriptions, or all of them for `None`.
    ///
    /// Budget adjustments and status rows are written in one transaction.
    /// Notifications go out after the commit: a disable notice only on the
    /// first disablement, an enable notice for every re-enablement.
    ///
    /// # Errors
    ///
    /// Returns an error if a read or the write transaction fails.
    pub async fn reconcile_desired_states(
        &self,
        admin: Uuid,
        subscription_ids: Option<&[Uuid]>,
    ) -> StoreResult<ReconcileReport> {
        let filter = SubscriptionFilter::from_ids(subscription_ids);
        let today = Utc::now().date_naive();

        let summaries = summarize_on(&self.db, &filter).await?;
        let plan = plan(&summaries, today);

        let txn = self.db.begin().await?;
        insert_adjustments(&txn, admin, &plan.adjustments).await?;

        for chunk in plan.changes.chunks(ROWS_PER_STATEMENT) {
            status::Entity::insert_many(chunk.iter().map(|change| status_row(admin, change)))
                .exec_without_returning(&txn)
                .await?;
        }
        txn.commit().await?;

        for change in plan.changes.iter().filter(|c| c.notify) {
            let notification = match change.reason {
                Some(reason) => Notification::will_be_disabled(change.subscription_id, reason),
                None => Notification::will_be_enabled(change.subscription_id),
            };
            self.notifier.notify(notification).await;
        }

        let report = ReconcileReport {
            adjusted: plan.adjustments.iter().map(|a| a.subscription_id).collect(),
            disabled: plan.disabled().map(|c| c.subscription_id).collect(),
            enabled: plan.enabled().map(|c| c.subscription_id).collect(),
        };

        if report.is_empty() {
            info!(subscriptions = summaries.len(), "Desired states unchanged");
        } else {
            info!(
                subscriptions = summaries.len(),
                adjusted = report.adjusted.len(),
                disabled = report.disabled.len(),
                enabled = report.enabled.len(),
                "Reconciled desired states"
            );
        }

        Ok(report)
    }

    /// Refreshes every desired state, then lists the subscriptions whose
    /// external state disagrees with it.
    ///
    /// # Errors
    ///
    /// Returns an error if reconciliation or the summary read fails.
    pub async fn pending_state_changes(&self, admin: Uuid) -> StoreResult<Vec<PendingChange>> {
        self.reconcile_desired_states(admin, None).await?;

        let pending: Vec<PendingChange> = summarize_on(&self.db, &SubscriptionFilter::All)
            .await?
            .iter()
            .filter_map(pending_change)
            .collect();

        if !pending.is_empty() {
            warn!(count = pending.len(), "Subscriptions awaiting a state change");
        }
        Ok(pending)
    }
}

fn status_row(admin: Uuid, change: &DesiredStatusChange) -> status::ActiveModel {
    status::ActiveModel {
        subscription_id: Set(change.subscription_id),
        admin: Set(admin),
        active: Set(change.active),
        reason: Set(change.reason.map(Into::into)),
        ..Default::default()
    }
}
