//! Approvals, allocations and persistence.
//!
//! Every write is validated against the subscription's current summary,
//! then notifies its users and reconciles that one subscription.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use budgetguard_core::reconcile::BudgetAdjustment;
use budgetguard_core::rules::{NewAllocation, NewApproval, check_allocation, check_approval};
use budgetguard_shared::DEFAULT_CURRENCY;

use super::ROWS_PER_STATEMENT;
use super::desired_state::DesiredStateRepository;
use super::summary::SummaryRepository;
use crate::entities::{allocations, approvals, persistence, subscription};
use crate::error::{StoreError, StoreResult};
use crate::notify::{Notification, Notifier};

/// Appends clamping rows for `adjustments`.
pub(crate) async fn insert_adjustments<C: ConnectionTrait>(
    conn: &C,
    admin: Uuid,
    adjustments: &[BudgetAdjustment],
) -> StoreResult<()> {
    let currency = DEFAULT_CURRENCY.code();

    for chunk in adjustments.chunks(ROWS_PER_STATEMENT) {
        let allocation_rows: Vec<allocations::ActiveModel> = chunk
            .iter()
            .filter_map(|adj| {
                adj.allocation.map(|amount| allocations::ActiveModel {
                    subscription_id: Set(adj.subscription_id),
                    admin: Set(admin),
                    ticket: Set(adj.ticket.to_string()),
                    amount: Set(amount),
                    currency: Set(currency.to_string()),
                    ..Default::default()
                })
            })
            .collect();

        let approval_rows: Vec<approvals::ActiveModel> = chunk
            .iter()
            .filter_map(|adj| {
                adj.approval.as_ref().map(|row| approvals::ActiveModel {
                    subscription_id: Set(adj.subscription_id),
                    admin: Set(admin),
                    ticket: Set(adj.ticket.to_string()),
                    amount: Set(row.amount),
                    currency: Set(currency.to_string()),
                    date_from: Set(row.date_from),
                    date_to: Set(row.date_to),
                    ..Default::default()
                })
            })
            .collect();

        if !allocation_rows.is_empty() {
            allocations::Entity::insert_many(allocation_rows)
                .exec_without_returning(conn)
                .await?;
        }
        if !approval_rows.is_empty() {
            approvals::Entity::insert_many(approval_rows)
                .exec_without_returning(conn)
                .await?;
        }
    }
    Ok(())
}

/// Budget ledger writes.
#[derive(Clone)]
pub struct BudgetRepository {
    db: DatabaseConnection,
    summaries: SummaryRepository,
    desired: DesiredStateRepository,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for BudgetRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetRepository").finish_non_exhaustive()
    }
}

impl BudgetRepository {
    /// Creates a new budget repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            summaries: SummaryRepository::new(db.clone()),
            desired: DesiredStateRepository::new(db.clone(), Arc::clone(&notifier)),
            db,
            notifier,
        }
    }

    /// Records an approval, and a matching allocation when requested.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown subscription, a ledger error when
    /// the approval breaks a rule, or a database error.
    pub async fn approve(&self, admin: Uuid, approval: NewApproval) -> StoreResult<approvals::Model> {
        let summary = self.summaries.summarize_one(approval.subscription_id).await?;
        check_approval(&approval, &summary, Utc::now().date_naive())?;

        let ticket = approval.recorded_ticket();
        let txn = self.db.begin().await?;

        let saved = approvals::ActiveModel {
            subscription_id: Set(approval.subscription_id),
            admin: Set(admin),
            ticket: Set(ticket.clone()),
            amount: Set(approval.amount),
            currency: Set(approval.currency.clone()),
            date_from: Set(approval.date_from),
            date_to: Set(approval.date_to),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if approval.allocate {
            allocations::ActiveModel {
                subscription_id: Set(approval.subscription_id),
                admin: Set(admin),
                ticket: Set(ticket.clone()),
                amount: Set(approval.amount),
                currency: Set(approval.currency.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }
        txn.commit().await?;

        info!(
            subscription_id = %approval.subscription_id,
            amount = %approval.amount,
            allocated = approval.allocate,
            "Recorded approval"
        );

        self.notifier
            .notify(Notification::new_approval(
                approval.subscription_id,
                json!({
                    "ticket": ticket,
                    "amount": approval.amount,
                    "currency": approval.currency,
                    "date_from": approval.date_from,
                    "date_to": approval.date_to,
                    "allocate": approval.allocate,
                }),
            ))
            .await;
        self.desired
            .reconcile_desired_states(admin, Some(&[approval.subscription_id]))
            .await?;

        Ok(saved)
    }

    /// Records an allocation of approved budget.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown subscription, a ledger error when
    /// the allocation breaks a rule, or a database error.
    pub async fn allocate(
        &self,
        admin: Uuid,
        allocation: NewAllocation,
    ) -> StoreResult<allocations::Model> {
        let summary = self.summaries.summarize_one(allocation.subscription_id).await?;
        check_allocation(&allocation, &summary)?;

        let saved = allocations::ActiveModel {
            subscription_id: Set(allocation.subscription_id),
            admin: Set(admin),
            ticket: Set(allocation.ticket.clone()),
            amount: Set(allocation.amount),
            currency: Set(allocation.currency.clone()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            subscription_id = %allocation.subscription_id,
            amount = %allocation.amount,
            "Recorded allocation"
        );

        self.notifier
            .notify(Notification::new_allocation(
                allocation.subscription_id,
                json!({
                    "ticket": allocation.ticket,
                    "amount": allocation.amount,
                    "currency": allocation.currency,
                }),
            ))
            .await;
        self.desired
            .reconcile_desired_states(admin, Some(&[allocation.subscription_id]))
            .await?;

        Ok(saved)
    }

    /// Marks a subscription as always on, or clears the mark.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown subscription, or a database error.
    pub async fn set_persistence(
        &self,
        admin: Uuid,
        subscription_id: Uuid,
        always_on: bool,
    ) -> StoreResult<persistence::Model> {
        subscription::Entity::find_by_id(subscription_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Subscription {subscription_id}")))?;

        let saved = persistence::ActiveModel {
            subscription_id: Set(subscription_id),
            admin: Set(admin),
            always_on: Set(always_on),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(subscription_id = %subscription_id, always_on, "Recorded persistence");

        self.desired
            .reconcile_desired_states(admin, Some(&[subscription_id]))
            .await?;
        Ok(saved)
    }

    /// Approvals of one subscription, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_approvals(&self, subscription_id: Uuid) -> StoreResult<Vec<approvals::Model>> {
        Ok(approvals::Entity::find()
            .filter(approvals::Column::SubscriptionId.eq(subscription_id))
            .order_by_asc(approvals::Column::Id)
            .all(&self.db)
            .await?)
    }

    /// Allocations of one subscription, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_allocations(
        &self,
        subscription_id: Uuid,
    ) -> StoreResult<Vec<allocations::Model>> {
        Ok(allocations::Entity::find()
            .filter(allocations::Column::SubscriptionId.eq(subscription_id))
            .order_by_asc(allocations::Column::Id)
            .all(&self.db)
            .await?)
    }
}
