//! Subscription rows and their external snapshots.

use std::sync::Arc;

use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use budgetguard_core::LockName;
use budgetguard_core::reconcile::{SubscriptionSnapshot, snapshot_notices};
use budgetguard_core::summary::{RoleAssignment, SubscriptionFilter, SubscriptionState};
use budgetguard_shared::config::AccountingConfig;

use super::ROWS_PER_STATEMENT;
use super::desired_state::DesiredStateRepository;
use super::monitoring::{BudgetMonitor, is_welcomed};
use super::summary::latest_details_query;
use crate::entities::{subscription, subscription_details};
use crate::error::{StoreError, StoreResult};
use crate::locks::AdvisoryLockManager;
use crate::notify::Notifier;

/// Snapshot of a subscription as reported by the cloud provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionDetailsInput {
    /// Subscription id.
    pub subscription_id: Uuid,
    /// Display name.
    pub display_name: Option<String>,
    /// Reported state.
    pub state: SubscriptionState,
    /// Role assignments as reported.
    pub role_assignments: Value,
}

impl SubscriptionDetailsInput {
    fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            display_name: self.display_name.clone(),
            state: self.state,
            role_assignments: parse_roles(&self.role_assignments),
        }
    }
}

/// Role assignments in a stored snapshot. Entries that do not describe a
/// role are skipped.
fn parse_roles(value: &Value) -> Vec<RoleAssignment> {
    value
        .as_array()
        .map(|roles| {
            roles
                .iter()
                .filter_map(|r| serde_json::from_value(r.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

fn stored_snapshot(row: &subscription_details::Model) -> Option<SubscriptionSnapshot> {
    Some(SubscriptionSnapshot {
        display_name: row.display_name.clone(),
        state: row.state.parse().ok()?,
        role_assignments: parse_roles(&row.role_assignments),
    })
}

/// Inserts the missing subscription rows, leaving existing ones untouched.
pub(crate) async fn ensure_subscriptions<C: ConnectionTrait>(
    conn: &C,
    admin: Uuid,
    ids: &[Uuid],
) -> StoreResult<()> {
    for chunk in ids.chunks(ROWS_PER_STATEMENT) {
        let rows = chunk.iter().map(|id| subscription::ActiveModel {
            subscription_id: Set(*id),
            admin: Set(admin),
            abolished: Set(false),
            ..Default::default()
        });
        subscription::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::column(subscription::Column::SubscriptionId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

/// Subscription repository.
#[derive(Clone)]
pub struct SubscriptionRepository {
    db: DatabaseConnection,
    locks: AdvisoryLockManager,
    desired: DesiredStateRepository,
    monitor: BudgetMonitor,
    roles_filter: Vec<String>,
}

impl std::fmt::Debug for SubscriptionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRepository").finish_non_exhaustive()
    }
}

impl SubscriptionRepository {
    /// Creates a new subscription repository.
    #[must_use]
    pub fn new(db: DatabaseConnection, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            locks: AdvisoryLockManager::new(&db),
            desired: DesiredStateRepository::new(db.clone(), Arc::clone(&notifier)),
            monitor: BudgetMonitor::new(db.clone(), notifier),
            roles_filter: AccountingConfig::default().roles_filter,
            db,
        }
    }

    /// Sets the roles whose holders changing is reported to users.
    #[must_use]
    pub fn with_roles_filter(mut self, roles_filter: Vec<String>) -> Self {
        self.roles_filter = roles_filter;
        self
    }

    /// Registers a subscription.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if it is already registered.
    pub async fn create_subscription(
        &self,
        admin: Uuid,
        subscription_id: Uuid,
    ) -> StoreResult<subscription::Model> {
        self.locks
            .with_lock(LockName::SubscriptionCreation, async {
                if subscription::Entity::find_by_id(subscription_id)
                    .one(&self.db)
                    .await?
                    .is_some()
                {
                    return Err(StoreError::Conflict(format!(
                        "Subscription {subscription_id} already exists"
                    )));
                }

                let saved = subscription::ActiveModel {
                    subscription_id: Set(subscription_id),
                    admin: Set(admin),
                    abolished: Set(false),
                    ..Default::default()
                }
                .insert(&self.db)
                .await?;

                info!(subscription_id = %subscription_id, "Registered subscription");
                Ok(saved)
            })
            .await
    }

    /// Finds a subscription.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if it does not exist.
    pub async fn get(&self, subscription_id: Uuid) -> StoreResult<subscription::Model> {
        subscription::Entity::find_by_id(subscription_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Subscription {subscription_id}")))
    }

    /// Stores a snapshot if it differs from the latest one, tells users
    /// what changed, then reconciles and checks the subscription. Returns
    /// whether a row was written.
    ///
    /// # Errors
    ///
    /// Returns an error if a query or reconciliation fails.
    pub async fn record_details(
        &self,
        admin: Uuid,
        details: SubscriptionDetailsInput,
    ) -> StoreResult<bool> {
        let id = details.subscription_id;
        ensure_subscriptions(&self.db, admin, &[id]).await?;

        let latest = latest_details_query(&SubscriptionFilter::One(id))
            .one(&self.db)
            .await?;
        let unchanged = latest.as_ref().is_some_and(|l| {
            l.display_name == details.display_name
                && l.state == details.state.as_str()
                && l.role_assignments == details.role_assignments
        });
        let previous = latest.as_ref().and_then(stored_snapshot);
        let current = details.snapshot();

        if unchanged {
            debug!(subscription_id = %id, "Subscription details unchanged");
        } else {
            subscription_details::ActiveModel {
                subscription_id: Set(id),
                display_name: Set(details.display_name),
                state: Set(details.state.as_str().to_string()),
                role_assignments: Set(details.role_assignments),
                ..Default::default()
            }
            .insert(&self.db)
            .await?;
            info!(subscription_id = %id, state = %details.state, "Recorded subscription details");
        }

        let welcomed = is_welcomed(&self.db, id).await?;
        let notices = snapshot_notices(previous.as_ref(), &current, welcomed, &self.roles_filter);
        self.monitor.send_snapshot_notices(id, &notices).await;

        self.desired
            .reconcile_desired_states(admin, Some(&[id]))
            .await?;
        self.monitor
            .check_budgets(&SubscriptionFilter::One(id))
            .await?;
        Ok(!unchanged)
    }
}
