//! Abolishment followed by reconciliation.
//!
//! `abolish` acts on every stale subscription in the database, so this is
//! the only test calling it.

mod common;

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
};
use serde_json::json;

use budgetguard_core::reconcile::BillingStatus;
use budgetguard_db::entities::{status, subscription, subscription_details};
use budgetguard_db::{
    AbolishmentRepository, DesiredStateRepository, SubscriptionRepository, SummaryRepository,
    UsageRepository,
};

use common::{ADMIN, days_from_today};

#[tokio::test]
async fn test_abolish_then_reconcile() {
    let Some(db) = common::setup().await else {
        return;
    };

    let id = common::new_subscription(&db).await;
    subscription_details::ActiveModel {
        subscription_id: Set(id),
        display_name: Set(Some("stale".to_string())),
        state: Set("Disabled".to_string()),
        role_assignments: Set(json!([])),
        created_at: Set((Utc::now() - Duration::days(100)).fixed_offset()),
        ..Default::default()
    }
    .insert(&db)
    .await
    .unwrap();

    common::approve(&db, id, dec!(100), days_from_today(-200), days_from_today(-120)).await;
    common::allocate(&db, id, dec!(80)).await;
    common::spend(&db, id, days_from_today(-150), dec!(110)).await;
    UsageRepository::new(db.clone(), common::notifier())
        .refresh_view()
        .await
        .unwrap();

    // A recently active subscription is left alone.
    let fresh = common::new_subscription(&db).await;
    SubscriptionRepository::new(db.clone(), common::notifier())
        .record_details(
            ADMIN,
            budgetguard_db::SubscriptionDetailsInput {
                subscription_id: fresh,
                display_name: Some("fresh".to_string()),
                state: budgetguard_core::summary::SubscriptionState::Disabled,
                role_assignments: json!([]),
            },
        )
        .await
        .unwrap();

    let abolisher = AbolishmentRepository::new(db.clone(), common::notifier(), 90);
    let inactive = abolisher.inactive_subscriptions().await.unwrap();
    assert!(inactive.contains(&id));
    assert!(!inactive.contains(&fresh));

    let adjustments = abolisher.abolish(ADMIN).await.unwrap();
    let ours = adjustments
        .iter()
        .find(|a| a.subscription_id == id)
        .unwrap();
    assert_eq!(ours.name.as_deref(), Some("stale"));
    assert_eq!(ours.allocation, dec!(30));
    assert_eq!(ours.approval, dec!(10));

    let row = subscription::Entity::find_by_id(id).one(&db).await.unwrap().unwrap();
    assert!(row.abolished);
    assert!(!abolisher.inactive_subscriptions().await.unwrap().contains(&id));

    let summaries = SummaryRepository::new(db.clone());
    let summary = summaries.summarize_one(id).await.unwrap();
    assert_eq!(summary.allocated, dec!(110));
    assert_eq!(summary.approved, dec!(110));

    let reconciler = DesiredStateRepository::new(db.clone(), common::notifier());
    for _ in 0..2 {
        reconciler
            .reconcile_desired_states(ADMIN, Some(&[id]))
            .await
            .unwrap();
    }

    let summary = summaries.summarize_one(id).await.unwrap();
    assert_eq!(summary.allocated, dec!(110));
    assert_eq!(summary.desired_status, Some(false));
    assert_eq!(summary.desired_status_info, Some(BillingStatus::Expired));

    let rows = status::Entity::find()
        .filter(status::Column::SubscriptionId.eq(id))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}
