//! Budget summary aggregation.
//!
//! One query builder per ledger aggregate, each restricted by a
//! [`SubscriptionFilter`]. The builders are pure and can be inspected with
//! `QueryTrait::build`; [`SummaryRepository`] runs them and merges the rows.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect, Select,
};
use uuid::Uuid;

use budgetguard_core::summary::{
    AllocationTotals, ApprovalTotals, LatestDetails, LatestPersistence, LatestStatus,
    SubscriptionFilter, SubscriptionRow, SubscriptionSummary, SummaryParts, UsageTotals, merge,
};

use crate::entities::{
    allocations, approvals, persistence, sea_orm_active_enums::BillingStatus, status,
    subscription, subscription_details, usage_view,
};
use crate::error::{StoreError, StoreResult};

// ============================================================================
// Query builders
// ============================================================================

fn restrict<E, C>(query: Select<E>, column: C, filter: &SubscriptionFilter) -> Select<E>
where
    E: EntityTrait,
    C: ColumnTrait,
{
    match filter {
        SubscriptionFilter::All => query,
        SubscriptionFilter::One(id) => query.filter(column.eq(*id)),
        SubscriptionFilter::Many(ids) => query.filter(column.is_in(ids.iter().copied())),
    }
}

/// Subscriptions covered by the filter.
#[must_use]
pub fn subscriptions_query(filter: &SubscriptionFilter) -> Select<subscription::Entity> {
    let query = subscription::Entity::find()
        .select_only()
        .column(subscription::Column::SubscriptionId)
        .column(subscription::Column::Abolished)
        .order_by_asc(subscription::Column::SubscriptionId);
    restrict(query, subscription::Column::SubscriptionId, filter)
}

/// Approval range and signed sum per subscription.
#[must_use]
pub fn approvals_totals_query(filter: &SubscriptionFilter) -> Select<approvals::Entity> {
    let query = approvals::Entity::find()
        .select_only()
        .column(approvals::Column::SubscriptionId)
        .column_as(Expr::col(approvals::Column::DateFrom).min(), "approved_from")
        .column_as(Expr::col(approvals::Column::DateTo).max(), "approved_to")
        .column_as(Expr::col(approvals::Column::Amount).sum(), "approved")
        .group_by(approvals::Column::SubscriptionId);
    restrict(query, approvals::Column::SubscriptionId, filter)
}

/// Signed allocation sum per subscription.
#[must_use]
pub fn allocations_totals_query(filter: &SubscriptionFilter) -> Select<allocations::Entity> {
    let query = allocations::Entity::find()
        .select_only()
        .column(allocations::Column::SubscriptionId)
        .column_as(Expr::col(allocations::Column::Amount).sum(), "allocated")
        .group_by(allocations::Column::SubscriptionId);
    restrict(query, allocations::Column::SubscriptionId, filter)
}

/// Usage rollup per subscription, read from `usage_view`.
#[must_use]
pub fn usage_totals_query(filter: &SubscriptionFilter) -> Select<usage_view::Entity> {
    restrict(
        usage_view::Entity::find(),
        usage_view::Column::SubscriptionId,
        filter,
    )
}

/// Latest persistence row per subscription.
#[must_use]
pub fn latest_persistence_query(filter: &SubscriptionFilter) -> Select<persistence::Entity> {
    let query = persistence::Entity::find()
        .select_only()
        .distinct_on([persistence::Column::SubscriptionId])
        .column(persistence::Column::SubscriptionId)
        .column(persistence::Column::AlwaysOn)
        .order_by_asc(persistence::Column::SubscriptionId)
        .order_by_desc(persistence::Column::Id);
    restrict(query, persistence::Column::SubscriptionId, filter)
}

/// Latest status row per subscription.
#[must_use]
pub fn latest_status_query(filter: &SubscriptionFilter) -> Select<status::Entity> {
    let query = status::Entity::find()
        .select_only()
        .distinct_on([status::Column::SubscriptionId])
        .column(status::Column::SubscriptionId)
        .column(status::Column::Active)
        .column(status::Column::Reason)
        .order_by_asc(status::Column::SubscriptionId)
        .order_by_desc(status::Column::Id);
    restrict(query, status::Column::SubscriptionId, filter)
}

/// Latest external snapshot per subscription.
#[must_use]
pub fn latest_details_query(filter: &SubscriptionFilter) -> Select<subscription_details::Entity> {
    let query = subscription_details::Entity::find()
        .distinct_on([subscription_details::Column::SubscriptionId])
        .order_by_asc(subscription_details::Column::SubscriptionId)
        .order_by_desc(subscription_details::Column::Id);
    restrict(query, subscription_details::Column::SubscriptionId, filter)
}

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromQueryResult)]
struct SubscriptionIdRow {
    subscription_id: Uuid,
    abolished: bool,
}

#[derive(Debug, FromQueryResult)]
struct ApprovalTotalsRow {
    subscription_id: Uuid,
    approved_from: Option<NaiveDate>,
    approved_to: Option<NaiveDate>,
    approved: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct AllocationTotalsRow {
    subscription_id: Uuid,
    allocated: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct PersistenceRow {
    subscription_id: Uuid,
    always_on: bool,
}

#[derive(Debug, FromQueryResult)]
struct StatusRow {
    subscription_id: Uuid,
    active: bool,
    reason: Option<BillingStatus>,
}

// ============================================================================
// Repository
// ============================================================================

/// Reads per-subscription budget summaries.
#[derive(Debug, Clone)]
pub struct SummaryRepository {
    db: DatabaseConnection,
}

impl SummaryRepository {
    /// Creates a new summary repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Summaries for every subscription the filter covers, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn summarize(
        &self,
        filter: &SubscriptionFilter,
    ) -> StoreResult<Vec<SubscriptionSummary>> {
        summarize_on(&self.db, filter).await
    }

    /// Summary of one subscription.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the subscription does not exist.
    pub async fn summarize_one(&self, subscription_id: Uuid) -> StoreResult<SubscriptionSummary> {
        self.summarize(&SubscriptionFilter::One(subscription_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("Subscription {subscription_id}")))
    }
}

/// Runs every aggregate on `conn` and merges them.
///
/// # Errors
///
/// Returns an error if a query fails.
pub async fn summarize_on<C: ConnectionTrait>(
    conn: &C,
    filter: &SubscriptionFilter,
) -> StoreResult<Vec<SubscriptionSummary>> {
    if filter.is_empty() {
        return Ok(Vec::new());
    }

    let subscriptions = subscriptions_query(filter)
        .into_model::<SubscriptionIdRow>()
        .all(conn)
        .await?
        .into_iter()
        .map(|r| SubscriptionRow {
            subscription_id: r.subscription_id,
            abolished: r.abolished,
        })
        .collect();

    let approvals = approvals_totals_query(filter)
        .into_model::<ApprovalTotalsRow>()
        .all(conn)
        .await?
        .into_iter()
        .map(|r| ApprovalTotals {
            subscription_id: r.subscription_id,
            approved_from: r.approved_from,
            approved_to: r.approved_to,
            approved: r.approved.unwrap_or_default(),
        })
        .collect();

    let allocations = allocations_totals_query(filter)
        .into_model::<AllocationTotalsRow>()
        .all(conn)
        .await?
        .into_iter()
        .map(|r| AllocationTotals {
            subscription_id: r.subscription_id,
            allocated: r.allocated.unwrap_or_default(),
        })
        .collect();

    let usage = usage_totals_query(filter)
        .all(conn)
        .await?
        .into_iter()
        .map(|r| UsageTotals {
            subscription_id: r.subscription_id,
            first_usage: r.first_usage,
            latest_usage: r.latest_usage,
            cost: r.cost,
            amortised_cost: r.amortised_cost,
            total_cost: r.total_cost,
        })
        .collect();

    let persistence = latest_persistence_query(filter)
        .into_model::<PersistenceRow>()
        .all(conn)
        .await?
        .into_iter()
        .map(|r| LatestPersistence {
            subscription_id: r.subscription_id,
            always_on: r.always_on,
        })
        .collect();

    let statuses = latest_status_query(filter)
        .into_model::<StatusRow>()
        .all(conn)
        .await?
        .into_iter()
        .map(|r| LatestStatus {
            subscription_id: r.subscription_id,
            active: r.active,
            reason: r.reason.map(Into::into),
        })
        .collect();

    let details = latest_details_query(filter)
        .all(conn)
        .await?
        .into_iter()
        .map(|r| LatestDetails {
            subscription_id: r.subscription_id,
            display_name: r.display_name,
            state: r.state.parse().ok(),
        })
        .collect();

    Ok(merge(SummaryParts {
        subscriptions,
        approvals,
        allocations,
        usage,
        persistence,
        statuses,
        details,
    }))
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
