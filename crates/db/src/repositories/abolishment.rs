//! Abolishment of long-disabled subscriptions.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, TransactionTrait};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use budgetguard_core::reconcile::{AbolishmentAdjustment, abolishment_adjustment};
use budgetguard_core::summary::{SubscriptionFilter, SubscriptionState};

use super::ROWS_PER_STATEMENT;
use super::budget::insert_adjustments;
use super::summary::{latest_details_query, summarize_on};
use crate::entities::subscription;
use crate::error::StoreResult;
use crate::notify::{AdminNotification, Notifier};

/// Subject of the abolishment summary sent to administrators.
pub const ABOLISHMENT_SUBJECT: &str = "Abolishment of subscriptions";

/// Zeroes the budgets of subscriptions that stayed disabled too long.
#[derive(Clone)]
pub struct AbolishmentRepository {
    db: DatabaseConnection,
    notifier: Arc<dyn Notifier>,
    inactive_days: i64,
}

impl std::fmt::Debug for AbolishmentRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbolishmentRepository")
            .field("inactive_days", &self.inactive_days)
            .finish_non_exhaustive()
    }
}

impl AbolishmentRepository {
    /// Creates an abolishment repository with its inactivity window.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>, inactive_days: i64) -> Self {
        Self {
            db,
            notifier,
            inactive_days,
        }
    }

    /// Subscriptions whose latest snapshot is older than the window, reports
    /// them disabled, and which are not abolished yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn inactive_subscriptions(&self) -> StoreResult<Vec<Uuid>> {
        let cutoff = Utc::now() - Duration::days(self.inactive_days);

        let candidates: Vec<Uuid> = latest_details_query(&SubscriptionFilter::All)
            .all(&self.db)
            .await?
            .into_iter()
            .filter(|d| d.created_at < cutoff && d.state == SubscriptionState::Disabled.as_str())
            .map(|d| d.subscription_id)
            .collect();
        if candidates.is_empty() {
            return Ok(candidates);
        }

        Ok(subscription::Entity::find()
            .filter(subscription::Column::SubscriptionId.is_in(candidates))
            .filter(subscription::Column::Abolished.eq(false))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| s.subscription_id)
            .collect())
    }

    /// Abolishes every inactive subscription.
    ///
    /// Subscriptions with at least one approval get adjustments that bring
    /// allocated and approved budget level with their total cost. All of
    /// them are flagged abolished, and administrators get one summary.
    ///
    /// # Errors
    ///
    /// Returns an error if a query or the write transaction fails.
    pub async fn abolish(&self, admin: Uuid) -> StoreResult<Vec<AbolishmentAdjustment>> {
        let ids = self.inactive_subscriptions().await?;
        if ids.is_empty() {
            info!("No subscriptions to abolish");
            return Ok(Vec::new());
        }

        let summaries = summarize_on(&self.db, &SubscriptionFilter::Many(ids.clone())).await?;
        let (reports, adjustments): (Vec<_>, Vec<_>) =
            summaries.iter().map(abolishment_adjustment).unzip();
        let adjustments: Vec<_> = adjustments.into_iter().flatten().collect();

        let txn = self.db.begin().await?;
        insert_adjustments(&txn, admin, &adjustments).await?;
        for chunk in ids.chunks(ROWS_PER_STATEMENT) {
            subscription::Entity::update_many()
                .col_expr(subscription::Column::Abolished, Expr::value(true))
                .filter(subscription::Column::SubscriptionId.is_in(chunk.iter().copied()))
                .exec(&txn)
                .await?;
        }
        txn.commit().await?;

        info!(
            abolished = ids.len(),
            adjusted = adjustments.len(),
            "Abolished inactive subscriptions"
        );

        self.notifier
            .notify_admins(AdminNotification {
                subject: ABOLISHMENT_SUBJECT.to_string(),
                email_type: "abolishment",
                body: summary_body(&reports),
                extra: json!({ "abolishments": reports }),
            })
            .await;

        Ok(reports)
    }
}

fn summary_body(reports: &[AbolishmentAdjustment]) -> String {
    let mut body = String::from("The following subscriptions have been abolished:\n\n");
    for r in reports {
        let name = r.name.as_deref().unwrap_or("(unnamed)");
        let _ = writeln!(
            body,
            "{} {name}: allocation {}, approval {}",
            r.subscription_id, r.allocation, r.approval
        );
    }
    body
}
