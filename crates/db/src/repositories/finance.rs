//! Finance records: who pays for a subscription, and when.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use tracing::info;
use uuid::Uuid;

use budgetguard_core::rules::{NewFinance, check_finance_update, check_new_finance};

use crate::entities::{cost_recovery, cost_recovery_log, finance, subscription};
use crate::error::{StoreError, StoreResult};

/// Finance repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct FinanceRepository {
    db: DatabaseConnection,
}

impl FinanceRepository {
    /// Creates a new finance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a finance record spanning whole months.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown subscription, a ledger error when
    /// the period overlaps recovered months, or a database error.
    pub async fn create(&self, admin: Uuid, input: NewFinance) -> StoreResult<finance::Model> {
        let input = input.with_whole_months();

        subscription::Entity::find_by_id(input.subscription_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Subscription {}", input.subscription_id)))?;

        let last_recovered: Option<chrono::NaiveDate> = cost_recovery::Entity::find()
            .select_only()
            .column(cost_recovery::Column::Month)
            .filter(cost_recovery::Column::SubscriptionId.eq(input.subscription_id))
            .order_by_desc(cost_recovery::Column::Id)
            .into_tuple()
            .one(&self.db)
            .await?;
        check_new_finance(&input, last_recovered)?;

        let saved = finance::ActiveModel {
            subscription_id: Set(input.subscription_id),
            ticket: Set(input.ticket),
            amount: Set(input.amount),
            priority: Set(input.priority),
            finance_code: Set(input.finance_code),
            date_from: Set(input.date_from),
            date_to: Set(input.date_to),
            admin: Set(admin),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!(
            finance_id = saved.id,
            subscription_id = %saved.subscription_id,
            amount = %saved.amount,
            "Created finance record"
        );
        Ok(saved)
    }

    /// Replaces a finance record.
    ///
    /// Dates may only move within months that have not been recovered.
    ///
    /// # Errors
    ///
    /// Returns `NotFound`, a ledger error, or a database error.
    pub async fn update(
        &self,
        admin: Uuid,
        finance_id: i64,
        input: NewFinance,
    ) -> StoreResult<finance::Model> {
        let input = input.with_whole_months();
        let existing = self.get(finance_id).await?;

        let last_logged: Option<chrono::NaiveDate> = cost_recovery_log::Entity::find()
            .select_only()
            .column(cost_recovery_log::Column::Month)
            .order_by_desc(cost_recovery_log::Column::Month)
            .into_tuple()
            .one(&self.db)
            .await?;
        check_finance_update(&as_input(&existing), &input, last_logged)?;

        let mut active: finance::ActiveModel = existing.into();
        active.ticket = Set(input.ticket);
        active.amount = Set(input.amount);
        active.priority = Set(input.priority);
        active.finance_code = Set(input.finance_code);
        active.date_from = Set(input.date_from);
        active.date_to = Set(input.date_to);
        active.admin = Set(admin);
        let saved = active.update(&self.db).await?;

        info!(finance_id, "Updated finance record");
        Ok(saved)
    }

    /// Deletes a finance record nothing has been recovered against.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record does not exist or belongs to another
    /// subscription, and `Conflict` if costs were already recovered from it.
    pub async fn delete(&self, finance_id: i64, subscription_id: Uuid) -> StoreResult<finance::Model> {
        let existing = self.get(finance_id).await?;
        if existing.subscription_id != subscription_id {
            return Err(StoreError::NotFound(format!(
                "Finance {finance_id} for subscription {subscription_id}"
            )));
        }

        existing
            .clone()
            .delete(&self.db)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict("Costs have already been recovered".to_string())
                }
                other => other,
            })?;

        info!(finance_id, subscription_id = %subscription_id, "Deleted finance record");
        Ok(existing)
    }

    /// Finds a finance record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if it does not exist.
    pub async fn get(&self, finance_id: i64) -> StoreResult<finance::Model> {
        finance::Entity::find_by_id(finance_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Finance {finance_id}")))
    }

    /// Finance records of one subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(&self, subscription_id: Uuid) -> StoreResult<Vec<finance::Model>> {
        Ok(finance::Entity::find()
            .filter(finance::Column::SubscriptionId.eq(subscription_id))
            .order_by_asc(finance::Column::Id)
            .all(&self.db)
            .await?)
    }
}

fn as_input(model: &finance::Model) -> NewFinance {
    NewFinance {
        subscription_id: model.subscription_id,
        ticket: model.ticket.clone(),
        amount: model.amount,
        priority: model.priority,
        finance_code: model.finance_code.clone(),
        date_from: model.date_from,
        date_to: model.date_to,
    }
}
