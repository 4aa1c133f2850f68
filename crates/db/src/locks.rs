//! Named PostgreSQL advisory locks.
//!
//! This module serializes logical operations (cost recovery for a month,
//! usage uploads for a date range, view refreshes, subscription creation)
//! across every process sharing the database.
//!
//! # Usage
//!
//! ```ignore
//! use budgetguard_core::LockName;
//! use budgetguard_db::locks::AdvisoryLockManager;
//!
//! let locks = AdvisoryLockManager::new(&db);
//!
//! // Fail fast when another process is already recovering March
//! let recovered = locks
//!     .with_lock_nowait(LockName::CostRecovery(march), async { recover().await })
//!     .await?;
//! ```
//!
//! Session-level advisory locks belong to the connection that took them, so
//! each guard pins one pooled connection for its lifetime. Locks that only
//! need to last as long as a transaction use [`lock_transaction`] instead.

use std::future::Future;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, Statement};
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tracing::{debug, warn};

use budgetguard_core::LockName;

use crate::error::{StoreError, StoreResult};

/// Takes `name` for the rest of the transaction `txn`, waiting for other
/// holders. The server releases it on commit or rollback.
///
/// # Errors
///
/// Returns `LockUnavailable` if the store fails while acquiring.
pub async fn lock_transaction<C: ConnectionTrait>(txn: &C, name: &LockName) -> StoreResult<()> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock($1)",
        [name.key().into()],
    ))
    .await
    .map_err(|e| StoreError::LockUnavailable(format!("{name}: {e}")))?;
    debug!(lock = %name, "Acquired transaction advisory lock");
    Ok(())
}

/// A held advisory lock.
///
/// Call [`AdvisoryLockGuard::release`] when done. A guard dropped without
/// being released detaches its connection from the pool and closes it, which
/// makes the server drop the lock with the session.
#[derive(Debug)]
pub struct AdvisoryLockGuard {
    name: LockName,
    key: i64,
    conn: Option<PoolConnection<Postgres>>,
}

impl AdvisoryLockGuard {
    /// The lock's name.
    #[must_use]
    pub const fn name(&self) -> &LockName {
        &self.name
    }

    /// Unlocks and returns the connection to the pool.
    ///
    /// A failed unlock is logged and the connection is closed instead.
    pub async fn release(mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        match sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .fetch_one(&mut *conn)
            .await
        {
            Ok(true) => debug!(lock = %self.name, "Released advisory lock"),
            Ok(false) => {
                warn!(lock = %self.name, "Advisory lock was not held at release");
            }
            Err(e) => {
                warn!(lock = %self.name, error = %e, "Failed to release advisory lock, closing connection");
                drop(conn.detach());
            }
        }
    }
}

impl Drop for AdvisoryLockGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!(lock = %self.name, "Advisory lock guard dropped without release, closing connection");
            drop(conn.detach());
        }
    }
}

/// Hands out advisory locks on a dedicated pooled connection each.
#[derive(Debug, Clone)]
pub struct AdvisoryLockManager {
    pool: PgPool,
}

impl AdvisoryLockManager {
    /// Creates a lock manager sharing the connection's pool.
    #[must_use]
    pub fn new(db: &DatabaseConnection) -> Self {
        Self {
            pool: db.get_postgres_connection_pool().clone(),
        }
    }

    async fn connection(&self, name: &LockName) -> StoreResult<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| StoreError::LockUnavailable(format!("{name}: {e}")))
    }

    async fn try_lock(conn: &mut PoolConnection<Postgres>, name: &LockName) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
            .bind(name.key())
            .fetch_one(&mut **conn)
            .await
            .map_err(|e| StoreError::LockUnavailable(format!("{name}: {e}")))
    }

    /// Acquires `name`, waiting for other holders to finish.
    ///
    /// # Errors
    ///
    /// Returns `LockUnavailable` if the store fails while acquiring.
    pub async fn acquire(&self, name: LockName) -> StoreResult<AdvisoryLockGuard> {
        let mut conn = self.connection(&name).await?;

        if !Self::try_lock(&mut conn, &name).await? {
            debug!(lock = %name, "Advisory lock busy, waiting");
            sqlx::query("SELECT pg_advisory_lock($1)")
                .bind(name.key())
                .execute(&mut *conn)
                .await
                .map_err(|e| StoreError::LockUnavailable(format!("{name}: {e}")))?;
        }

        debug!(lock = %name, "Acquired advisory lock");
        Ok(AdvisoryLockGuard {
            key: name.key(),
            name,
            conn: Some(conn),
        })
    }

    /// Acquires `name` only if nobody holds it.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the lock is held elsewhere, `LockUnavailable`
    /// if the store fails.
    pub async fn acquire_nowait(&self, name: LockName) -> StoreResult<AdvisoryLockGuard> {
        let mut conn = self.connection(&name).await?;

        if !Self::try_lock(&mut conn, &name).await? {
            return Err(StoreError::Conflict(format!(
                "Operation '{name}' is already in progress"
            )));
        }

        debug!(lock = %name, "Acquired advisory lock");
        Ok(AdvisoryLockGuard {
            key: name.key(),
            name,
            conn: Some(conn),
        })
    }

    /// Runs `fut` while holding `name`, waiting for the lock if needed.
    ///
    /// # Errors
    ///
    /// Returns the acquisition error or the future's error.
    pub async fn with_lock<T, F>(&self, name: LockName, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let guard = self.acquire(name).await?;
        let result = fut.await;
        guard.release().await;
        result
    }

    /// Runs `fut` while holding `name`, failing fast if it is held.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the lock is held, or the future's error.
    pub async fn with_lock_nowait<T, F>(&self, name: LockName, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        let guard = self.acquire_nowait(name).await?;
        let result = fut.await;
        guard.release().await;
        result
    }
}
