//! Monthly cost recovery.
//!
//! Splits each subscription's usage for a month across the finance records
//! covering that month, lowest priority value first. Committed months are
//! logged in `cost_recovery_log`, which acts as a watermark: each commit
//! must target the month right after the last logged one. Commits check and
//! advance the watermark under a transaction lock, so concurrent commits of
//! different months cannot leave a gap.

use std::collections::{BTreeMap, HashMap};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use budgetguard_core::LockName;
use budgetguard_core::recovery::{FinanceSlice, RecoveryMonth, allocate, validate_month};

use crate::entities::{cost_recovery, cost_recovery_log, finance, usage};
use crate::error::StoreResult;
use crate::locks::{AdvisoryLockManager, lock_transaction};

/// Cost recovery repository.
#[derive(Debug, Clone)]
pub struct CostRecoveryRepository {
    db: DatabaseConnection,
    locks: AdvisoryLockManager,
}

impl CostRecoveryRepository {
    /// Creates a new cost recovery repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            locks: AdvisoryLockManager::new(&db),
            db,
        }
    }

    /// The last committed month, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn last_logged_month(&self) -> StoreResult<Option<RecoveryMonth>> {
        last_logged_on(&self.db).await
    }

    /// Recoveries already recorded for a subscription, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, subscription_id: Uuid) -> StoreResult<Vec<cost_recovery::Model>> {
        Ok(cost_recovery::Entity::find()
            .filter(cost_recovery::Column::SubscriptionId.eq(subscription_id))
            .order_by_asc(cost_recovery::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Calculates the recoveries for `month`.
    ///
    /// A dry run computes and returns the rows, then rolls back. A committed
    /// run holds the month's advisory lock, fails fast if another process
    /// holds it, waits for any other commit in flight, and logs the month.
    ///
    /// # Errors
    ///
    /// Returns a recovery error for a refused month, `Conflict` when the
    /// month is being or has been committed elsewhere, or a database error.
    pub async fn recover(
        &self,
        month: NaiveDate,
        commit: bool,
        admin: Uuid,
    ) -> StoreResult<Vec<cost_recovery::Model>> {
        let month = RecoveryMonth::new(month)?;
        let today = Utc::now().date_naive();

        if commit {
            self.locks
                .with_lock_nowait(
                    LockName::CostRecovery(month),
                    self.run(month, true, admin, today),
                )
                .await
        } else {
            self.run(month, false, admin, today).await
        }
    }

    async fn run(
        &self,
        month: RecoveryMonth,
        commit: bool,
        admin: Uuid,
        today: NaiveDate,
    ) -> StoreResult<Vec<cost_recovery::Model>> {
        let txn = self.db.begin().await?;
        if commit {
            // Serializes every commit's watermark check with its log insert.
            lock_transaction(&txn, &LockName::CostRecoveryLog).await?;
        }
        validate_month(month, last_logged_on(&txn).await?, today, commit)?;

        let slices = finance_slices(&txn, month).await?;
        let subscription_ids: Vec<Uuid> = slices.keys().copied().collect();
        let usage = month_usage(&txn, month, &subscription_ids).await?;

        let mut rows = Vec::new();
        for (subscription_id, finances) in &slices {
            let total = usage.get(subscription_id).copied().unwrap_or_default();
            for recovery in allocate(total, finances) {
                let saved = cost_recovery::ActiveModel {
                    finance_id: Set(recovery.finance_id),
                    subscription_id: Set(recovery.subscription_id),
                    month: Set(month.first_day()),
                    finance_code: Set(recovery.finance_code),
                    amount: Set(recovery.amount),
                    date_recovered: Set(None),
                    admin: Set(admin),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
                rows.push(saved);
            }
        }

        if commit {
            cost_recovery_log::ActiveModel {
                month: Set(month.first_day()),
                admin: Set(admin),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            txn.commit().await?;
            info!(month = %month, rows = rows.len(), "Committed cost recovery");
        } else {
            txn.rollback().await?;
            info!(month = %month, rows = rows.len(), "Calculated cost recovery (dry run)");
        }

        Ok(rows)
    }
}

async fn last_logged_on<C: ConnectionTrait>(conn: &C) -> StoreResult<Option<RecoveryMonth>> {
    let month: Option<NaiveDate> = cost_recovery_log::Entity::find()
        .select_only()
        .column(cost_recovery_log::Column::Month)
        .order_by_desc(cost_recovery_log::Column::Month)
        .into_tuple()
        .one(conn)
        .await?;
    Ok(month.map(RecoveryMonth::containing))
}

/// Finance records covering the month's first day, grouped by subscription,
/// each with the amount already recovered against it.
async fn finance_slices<C: ConnectionTrait>(
    conn: &C,
    month: RecoveryMonth,
) -> StoreResult<BTreeMap<Uuid, Vec<FinanceSlice>>> {
    let first = month.first_day();
    let finances = finance::Entity::find()
        .filter(finance::Column::DateFrom.lte(first))
        .filter(finance::Column::DateTo.gte(first))
        .order_by_asc(finance::Column::Priority)
        .order_by_asc(finance::Column::Id)
        .all(conn)
        .await?;
    if finances.is_empty() {
        return Ok(BTreeMap::new());
    }

    let recovered: HashMap<i64, Decimal> = cost_recovery::Entity::find()
        .select_only()
        .column(cost_recovery::Column::FinanceId)
        .column_as(Expr::col(cost_recovery::Column::Amount).sum(), "recovered")
        .filter(cost_recovery::Column::FinanceId.is_in(finances.iter().map(|f| f.id)))
        .group_by(cost_recovery::Column::FinanceId)
        .into_tuple::<(i64, Option<Decimal>)>()
        .all(conn)
        .await?
        .into_iter()
        .map(|(id, sum)| (id, sum.unwrap_or_default()))
        .collect();

    let mut grouped: BTreeMap<Uuid, Vec<FinanceSlice>> = BTreeMap::new();
    for f in finances {
        grouped.entry(f.subscription_id).or_default().push(FinanceSlice {
            already_recovered: recovered.get(&f.id).copied().unwrap_or_default(),
            finance_id: f.id,
            subscription_id: f.subscription_id,
            finance_code: f.finance_code,
            priority: f.priority,
            amount: f.amount,
        });
    }
    Ok(grouped)
}

/// Total usage within the month per subscription.
async fn month_usage<C: ConnectionTrait>(
    conn: &C,
    month: RecoveryMonth,
    subscription_ids: &[Uuid],
) -> StoreResult<HashMap<Uuid, Decimal>> {
    if subscription_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let totals = usage::Entity::find()
        .select_only()
        .column(usage::Column::SubscriptionId)
        .column_as(Expr::col(usage::Column::TotalCost).sum(), "total")
        .filter(usage::Column::SubscriptionId.is_in(subscription_ids.iter().copied()))
        .filter(usage::Column::Date.between(month.first_day(), month.last_day()))
        .group_by(usage::Column::SubscriptionId)
        .into_tuple::<(Uuid, Option<Decimal>)>()
        .all(conn)
        .await?;

    Ok(totals
        .into_iter()
        .map(|(id, total)| (id, total.unwrap_or_default()))
        .collect())
}
