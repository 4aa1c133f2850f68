//! Advisory lock exclusivity.

mod common;

use std::time::Duration;

use futures::future::join_all;
use uuid::Uuid;

use budgetguard_core::LockName;
use budgetguard_db::{AdvisoryLockManager, StoreError};

fn unique_lock() -> LockName {
    LockName::view_refresh(&format!("test_{}", Uuid::new_v4().simple()))
}

#[tokio::test]
async fn test_nowait_conflicts_while_held() {
    let Some(db) = common::setup().await else {
        return;
    };
    let locks = AdvisoryLockManager::new(&db);
    let name = unique_lock();

    let guard = locks.acquire_nowait(name.clone()).await.unwrap();
    let err = locks.acquire_nowait(name.clone()).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(ref msg) if msg.contains("already in progress")));

    guard.release().await;
    let again = locks.acquire_nowait(name).await.unwrap();
    again.release().await;
}

#[tokio::test]
async fn test_dropped_guard_frees_lock() {
    let Some(db) = common::setup().await else {
        return;
    };
    let locks = AdvisoryLockManager::new(&db);
    let name = unique_lock();

    drop(locks.acquire(name.clone()).await.unwrap());

    let guard = tokio::time::timeout(Duration::from_secs(10), locks.acquire(name))
        .await
        .expect("lock freed after drop")
        .unwrap();
    guard.release().await;
}

#[tokio::test]
async fn test_with_lock_serializes_sections() {
    let Some(db) = common::setup().await else {
        return;
    };
    let locks = AdvisoryLockManager::new(&db);
    let name = unique_lock();
    let inside = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));

    let tasks = (0..4).map(|_| {
        let locks = locks.clone();
        let name = name.clone();
        let inside = inside.clone();
        async move {
            locks
                .with_lock(name, async {
                    let now = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    assert_eq!(now, 0, "two holders at once");
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(())
                })
                .await
        }
    });

    for result in join_all(tasks).await {
        result.unwrap();
    }
}
