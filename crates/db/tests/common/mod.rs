//! Shared setup for the integration tests.
//!
//! Tests run against the database named by `DATABASE_URL` and are skipped
//! when it is not set.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection};
use uuid::Uuid;

use budgetguard_core::LockName;
use budgetguard_db::entities::{allocations, approvals, emails, subscription, usage};
use budgetguard_db::migration::{Migrator, MigratorTrait};
use budgetguard_db::notify::{AdminNotification, Notification};
use budgetguard_db::{AdvisoryLockManager, NoopNotifier, Notifier, StoreError};

pub const ADMIN: Uuid = Uuid::from_u128(0x0b9d);

/// Connects and migrates, or returns `None` when no database is configured.
pub async fn setup() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping");
        return None;
    };
    let db = budgetguard_db::connect(&url).await.expect("connect");

    // Test binaries run in parallel processes; migrate one at a time.
    AdvisoryLockManager::new(&db)
        .with_lock(LockName::view_refresh("schema_migrations"), async {
            Migrator::up(&db, None).await.map_err(StoreError::from)
        })
        .await
        .expect("migrate");
    Some(db)
}

pub fn notifier() -> Arc<dyn Notifier> {
    Arc::new(NoopNotifier)
}

/// Keeps every notice for inspection.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Templates of the notices sent about `id`, in order.
    pub fn templates(&self, id: Uuid) -> Vec<&'static str> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.subscription_id == id)
            .map(|n| n.template)
            .collect()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }

    async fn notify_admins(&self, _notification: AdminNotification) {}
}

/// Records an email as delivered today.
pub async fn delivered(db: &DatabaseConnection, id: Uuid, email_type: &str) {
    emails::ActiveModel {
        subscription_id: Set(Some(id)),
        email_type: Set(email_type.to_string()),
        recipients: Set("owner@example.com".to_string()),
        extra_info: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert email");
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub async fn new_subscription(db: &DatabaseConnection) -> Uuid {
    let id = Uuid::new_v4();
    subscription::ActiveModel {
        subscription_id: Set(id),
        admin: Set(ADMIN),
        abolished: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert subscription");
    id
}

pub async fn approve(
    db: &DatabaseConnection,
    id: Uuid,
    amount: Decimal,
    date_from: NaiveDate,
    date_to: NaiveDate,
) {
    approvals::ActiveModel {
        subscription_id: Set(id),
        admin: Set(ADMIN),
        ticket: Set("T-1".to_string()),
        amount: Set(amount),
        currency: Set("GBP".to_string()),
        date_from: Set(date_from),
        date_to: Set(date_to),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert approval");
}

pub async fn allocate(db: &DatabaseConnection, id: Uuid, amount: Decimal) {
    allocations::ActiveModel {
        subscription_id: Set(id),
        admin: Set(ADMIN),
        ticket: Set("T-1".to_string()),
        amount: Set(amount),
        currency: Set("GBP".to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert allocation");
}

pub async fn spend(db: &DatabaseConnection, id: Uuid, date: NaiveDate, amount: Decimal) {
    usage::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        subscription_id: Set(id),
        date: Set(date),
        cost: Set(amount),
        amortised_cost: Set(Decimal::ZERO),
        total_cost: Set(amount),
        invoice_section: Set(String::new()),
        monthly_upload: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert usage");
}
