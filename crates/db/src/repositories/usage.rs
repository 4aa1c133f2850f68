//! Usage uploads and the `usage_view` rollup.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use budgetguard_core::LockName;
use budgetguard_core::reconcile::usage_alerts;
use budgetguard_core::recovery::RecoveryMonth;
use budgetguard_core::summary::SubscriptionFilter;

use super::ROWS_PER_STATEMENT;
use super::desired_state::DesiredStateRepository;
use super::monitoring::BudgetMonitor;
use super::subscription::ensure_subscriptions;
use super::summary::summarize_on;
use crate::entities::usage;
use crate::error::{StoreError, StoreResult};
use crate::locks::AdvisoryLockManager;
use crate::notify::Notifier;

/// Name of the usage rollup view.
pub const USAGE_VIEW: &str = "usage_view";

/// One billing line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageInput {
    /// Provider line id.
    pub id: String,
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Usage date.
    pub date: NaiveDate,
    /// Actual cost.
    pub cost: Decimal,
    /// Amortised cost.
    pub amortised_cost: Decimal,
    /// Cost counted against budgets.
    pub total_cost: Decimal,
    /// Invoice section.
    pub invoice_section: String,
    /// Set on lines of a finalised monthly upload.
    pub monthly_upload: Option<NaiveDate>,
}

/// Usage repository.
#[derive(Clone)]
pub struct UsageRepository {
    db: DatabaseConnection,
    locks: AdvisoryLockManager,
    desired: DesiredStateRepository,
    monitor: BudgetMonitor,
}

impl std::fmt::Debug for UsageRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageRepository").finish_non_exhaustive()
    }
}

fn date_range(rows: &[UsageInput]) -> Option<(NaiveDate, NaiveDate)> {
    let start = rows.iter().map(|r| r.date).min()?;
    let end = rows.iter().map(|r| r.date).max()?;
    Some((start, end))
}

fn unique_subscriptions(rows: &[UsageInput]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = rows.iter().map(|r| r.subscription_id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Checks that a monthly upload covers exactly one month and is flagged.
fn monthly_range(rows: &[UsageInput]) -> StoreResult<RecoveryMonth> {
    let Some((start, end)) = date_range(rows) else {
        return Err(StoreError::Validation("Monthly usage upload is empty".to_string()));
    };

    let month = RecoveryMonth::containing(start);
    if RecoveryMonth::containing(end) != month {
        return Err(StoreError::Validation(format!(
            "Monthly usage should contain usage only for one month. \
             Min, Max usage date: ({start}), ({end})."
        )));
    }
    if rows.iter().any(|r| r.monthly_upload.is_none()) {
        return Err(StoreError::Validation(
            "Monthly usage must have monthly_upload set".to_string(),
        ));
    }
    Ok(month)
}

async fn upsert<C: ConnectionTrait>(conn: &C, rows: &[UsageInput]) -> StoreResult<()> {
    for chunk in rows.chunks(ROWS_PER_STATEMENT) {
        let models = chunk.iter().map(|r| usage::ActiveModel {
            id: Set(r.id.clone()),
            subscription_id: Set(r.subscription_id),
            date: Set(r.date),
            cost: Set(r.cost),
            amortised_cost: Set(r.amortised_cost),
            total_cost: Set(r.total_cost),
            invoice_section: Set(r.invoice_section.clone()),
            monthly_upload: Set(r.monthly_upload),
            ..Default::default()
        });
        usage::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(usage::Column::Id)
                    .update_columns([
                        usage::Column::SubscriptionId,
                        usage::Column::Date,
                        usage::Column::Cost,
                        usage::Column::AmortisedCost,
                        usage::Column::TotalCost,
                        usage::Column::InvoiceSection,
                        usage::Column::MonthlyUpload,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

impl UsageRepository {
    /// Creates a new usage repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            locks: AdvisoryLockManager::new(&db),
            desired: DesiredStateRepository::new(db.clone(), Arc::clone(&notifier)),
            monitor: BudgetMonitor::new(db.clone(), notifier),
            db,
        }
    }

    /// Upserts daily usage lines.
    ///
    /// Unknown subscriptions are registered. The view is refreshed, usage
    /// thresholds newly crossed are alerted, and the affected subscriptions
    /// reconciled afterwards. Returns the number of
    /// lines written.
    ///
    /// # Errors
    ///
    /// Returns an error if a write, the refresh, or reconciliation fails.
    pub async fn upload_usage(&self, admin: Uuid, rows: &[UsageInput]) -> StoreResult<usize> {
        let Some((start, end)) = date_range(rows) else {
            return Ok(0);
        };
        let ids = unique_subscriptions(rows);

        self.locks
            .with_lock(LockName::UsageUpload { start, end }, async {
                let txn = self.db.begin().await?;
                ensure_subscriptions(&txn, admin, &ids).await?;
                upsert(&txn, rows).await?;
                txn.commit().await?;
                Ok(())
            })
            .await?;

        info!(rows = rows.len(), %start, %end, "Uploaded usage");
        self.after_upload(admin, &ids).await?;
        Ok(rows.len())
    }

    /// Replaces one month of usage with its final figures.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the lines span several months, lack the
    /// monthly flag, or the month was already posted.
    pub async fn upload_monthly_usage(&self, admin: Uuid, rows: &[UsageInput]) -> StoreResult<usize> {
        let month = monthly_range(rows)?;
        let (start, end) = (month.first_day(), month.last_day());

        let posted = usage::Entity::find()
            .filter(usage::Column::Date.between(start, end))
            .filter(usage::Column::MonthlyUpload.is_not_null())
            .count(&self.db)
            .await?;
        if posted > 0 {
            return Err(StoreError::Validation(format!(
                "Monthly usage for {start}-{end} has already been posted"
            )));
        }

        let ids = unique_subscriptions(rows);
        self.locks
            .with_lock(LockName::UsageUpload { start, end }, async {
                let txn = self.db.begin().await?;
                usage::Entity::delete_many()
                    .filter(usage::Column::Date.between(start, end))
                    .exec(&txn)
                    .await?;
                ensure_subscriptions(&txn, admin, &ids).await?;
                upsert(&txn, rows).await?;
                txn.commit().await?;
                Ok(())
            })
            .await?;

        info!(rows = rows.len(), month = %month, "Uploaded monthly usage");
        self.after_upload(admin, &ids).await?;
        Ok(rows.len())
    }

    /// Recomputes `usage_view`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock or the refresh fails.
    pub async fn refresh_view(&self) -> StoreResult<()> {
        self.locks
            .with_lock(LockName::view_refresh(USAGE_VIEW), async {
                self.db
                    .execute_unprepared(&format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {USAGE_VIEW}"))
                    .await?;
                Ok(())
            })
            .await
    }

    async fn after_upload(&self, admin: Uuid, ids: &[Uuid]) -> StoreResult<()> {
        // Summaries read the view, which still holds the previous figures.
        let filter = SubscriptionFilter::Many(ids.to_vec());
        let before = summarize_on(&self.db, &filter).await?;
        self.refresh_view().await?;
        let after = summarize_on(&self.db, &filter).await?;
        self.monitor
            .send_usage_alerts(&usage_alerts(&before, &after))
            .await;

        self.desired
            .reconcile_desired_states(admin, Some(ids))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(id: &str, date: NaiveDate, monthly: bool) -> UsageInput {
        UsageInput {
            id: id.to_string(),
            subscription_id: Uuid::nil(),
            date,
            cost: dec!(1),
            amortised_cost: dec!(0),
            total_cost: dec!(1),
            invoice_section: String::new(),
            monthly_upload: monthly.then_some(date),
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_monthly_range_accepts_one_month() {
        let rows = [line("a", day(3, 1), true), line("b", day(3, 31), true)];
        let month = monthly_range(&rows).unwrap();
        assert_eq!(month.first_day(), day(3, 1));
    }

    #[test]
    fn test_monthly_range_rejects_two_months() {
        let rows = [line("a", day(3, 31), true), line("b", day(4, 1), true)];
        let err = monthly_range(&rows).unwrap_err();
        assert!(err.to_string().contains("only for one month"));
    }

    #[test]
    fn test_monthly_range_requires_flag() {
        let rows = [line("a", day(3, 2), true), line("b", day(3, 3), false)];
        assert!(matches!(monthly_range(&rows), Err(StoreError::Validation(_))));
    }

    #[test]
    fn test_unique_subscriptions_dedups() {
        let a = Uuid::from_u128(1);
        let mut rows = vec![line("x", day(1, 1), false); 3];
        rows[1].subscription_id = a;
        assert_eq!(unique_subscriptions(&rows), vec![Uuid::nil(), a]);
    }
}
