//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for the budget ledger, reconciliation,
//!   cost recovery and abolishment
//! - Named advisory locks
//! - Notification delivery
//! - Database migrations

pub mod entities;
pub mod error;
pub mod locks;
pub mod migration;
pub mod notify;
pub mod repositories;

pub use error::{StoreError, StoreResult};
pub use locks::{AdvisoryLockGuard, AdvisoryLockManager};
pub use notify::{EmailNotifier, NoopNotifier, Notifier};
pub use repositories::{
    ABOLISHMENT_SUBJECT, AbolishmentRepository, BudgetMonitor, BudgetRepository, CostRecoveryRepository,
    DesiredStateRepository, FinanceRepository, MonitorReport, SubscriptionDetailsInput, SubscriptionRepository,
    SummaryRepository, USAGE_VIEW, UsageInput, UsageRepository,
};

use budgetguard_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a pooled connection using the configured pool sizes.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_with(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .sqlx_logging(false);
    Database::connect(options).await
}
