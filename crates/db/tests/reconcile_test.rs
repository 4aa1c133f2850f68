//! Desired-state reconciliation against a live database.

mod common;

use rust_decimal_macros::dec;
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};
use uuid::Uuid;

use budgetguard_core::reconcile::BillingStatus;
use budgetguard_core::rules::NewAllocation;
use budgetguard_db::entities::{allocations, status, subscription};
use budgetguard_db::entities::sea_orm_active_enums::BillingStatus as DbBillingStatus;
use budgetguard_db::{BudgetRepository, DesiredStateRepository, SummaryRepository, UsageRepository};

use common::{ADMIN, days_from_today};

async fn latest_status(db: &DatabaseConnection, id: Uuid) -> Option<status::Model> {
    status::Entity::find()
        .filter(status::Column::SubscriptionId.eq(id))
        .order_by_desc(status::Column::Id)
        .one(db)
        .await
        .unwrap()
}

async fn status_rows(db: &DatabaseConnection, id: Uuid) -> u64 {
    status::Entity::find()
        .filter(status::Column::SubscriptionId.eq(id))
        .count(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_over_budget_disables_then_allocation_enables() {
    let Some(db) = common::setup().await else {
        return;
    };
    let reconciler = DesiredStateRepository::new(db.clone(), common::notifier());
    let budgets = BudgetRepository::new(db.clone(), common::notifier());
    let usage = UsageRepository::new(db.clone(), common::notifier());

    let id = common::new_subscription(&db).await;
    common::approve(&db, id, dec!(100), days_from_today(-10), days_from_today(30)).await;
    common::allocate(&db, id, dec!(50)).await;
    common::spend(&db, id, days_from_today(-1), dec!(60)).await;
    usage.refresh_view().await.unwrap();

    let report = reconciler
        .reconcile_desired_states(ADMIN, Some(&[id]))
        .await
        .unwrap();
    assert_eq!(report.disabled, vec![id]);
    assert!(report.adjusted.is_empty());

    let latest = latest_status(&db, id).await.unwrap();
    assert!(!latest.active);
    assert_eq!(latest.reason, Some(DbBillingStatus::OverBudget));

    // A second pass with nothing changed writes nothing.
    let again = reconciler
        .reconcile_desired_states(ADMIN, Some(&[id]))
        .await
        .unwrap();
    assert!(again.is_empty());
    assert_eq!(status_rows(&db, id).await, 1);

    budgets
        .allocate(
            ADMIN,
            NewAllocation {
                subscription_id: id,
                ticket: "T-2".to_string(),
                amount: dec!(20),
                currency: "GBP".to_string(),
            },
        )
        .await
        .unwrap();

    let latest = latest_status(&db, id).await.unwrap();
    assert!(latest.active);
    assert_eq!(latest.reason, None);
    assert_eq!(status_rows(&db, id).await, 2);

    let summary = SummaryRepository::new(db.clone())
        .summarize_one(id)
        .await
        .unwrap();
    assert_eq!(summary.allocated, dec!(70));
    assert_eq!(summary.total_cost, dec!(60));
    assert_eq!(summary.desired_status, Some(true));
}

#[tokio::test]
async fn test_expired_budget_is_clamped_once() {
    let Some(db) = common::setup().await else {
        return;
    };
    let reconciler = DesiredStateRepository::new(db.clone(), common::notifier());

    let id = common::new_subscription(&db).await;
    common::approve(&db, id, dec!(100), days_from_today(-60), days_from_today(-1)).await;
    common::allocate(&db, id, dec!(80)).await;
    common::spend(&db, id, days_from_today(-30), dec!(25)).await;
    UsageRepository::new(db.clone(), common::notifier())
        .refresh_view()
        .await
        .unwrap();

    let report = reconciler
        .reconcile_desired_states(ADMIN, Some(&[id]))
        .await
        .unwrap();
    assert_eq!(report.adjusted, vec![id]);
    assert_eq!(report.disabled, vec![id]);

    let summary = SummaryRepository::new(db.clone())
        .summarize_one(id)
        .await
        .unwrap();
    assert_eq!(summary.allocated, dec!(25));
    assert_eq!(summary.approved, dec!(25));
    assert_eq!(summary.desired_status_info, Some(BillingStatus::Expired));

    let again = reconciler
        .reconcile_desired_states(ADMIN, Some(&[id]))
        .await
        .unwrap();
    assert!(again.is_empty());

    let adjustments = allocations::Entity::find()
        .filter(allocations::Column::SubscriptionId.eq(id))
        .filter(allocations::Column::Ticket.eq("Expiry adjustment"))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(adjustments, 1);
}

#[tokio::test]
async fn test_unknown_subscription_summary_is_not_found() {
    let Some(db) = common::setup().await else {
        return;
    };
    let err = SummaryRepository::new(db)
        .summarize_one(Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, budgetguard_db::StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_reconcile_writes_more_rows_than_one_statement_can_bind() {
    let Some(db) = common::setup().await else {
        return;
    };

    // Four bind parameters per status row: 17k rows exceed PostgreSQL's 65535.
    let ids: Vec<Uuid> = (0..17_000).map(|_| Uuid::new_v4()).collect();
    for chunk in ids.chunks(1000) {
        subscription::Entity::insert_many(chunk.iter().map(|id| subscription::ActiveModel {
            subscription_id: Set(*id),
            admin: Set(ADMIN),
            abolished: Set(false),
            ..Default::default()
        }))
        .exec_without_returning(&db)
        .await
        .unwrap();
    }

    let reconciler = DesiredStateRepository::new(db.clone(), common::notifier());
    let report = reconciler
        .reconcile_desired_states(ADMIN, Some(&ids))
        .await
        .unwrap();
    assert_eq!(report.disabled.len(), ids.len());

    let written = status::Entity::find()
        .filter(status::Column::SubscriptionId.is_in(ids.iter().copied()))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(written, 17_000);

    let rerun = reconciler
        .reconcile_desired_states(ADMIN, Some(&ids))
        .await
        .unwrap();
    assert!(rerun.is_empty());
}
