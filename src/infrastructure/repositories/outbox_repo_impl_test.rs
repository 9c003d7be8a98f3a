use super::{OutboxRepository, SqlOutboxStore};
use crate::domain::models::outbox::{
    ClaimedEvent, NewOutboxEvent, OutboxStatus, Reconciliation, RetryDecision,
};
use crate::domain::repositories::outbox_repository::{
    BatchClaimer, OutboxEnqueuer, RepositoryError,
};
use crate::infrastructure::database::unit_of_work::{Scope, UnitOfWork};
use chrono::{Duration as ChronoDuration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const LEASE: Duration = Duration::from_secs(30);

async fn setup() -> (UnitOfWork, SqlOutboxStore) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let uow = UnitOfWork::new(Arc::new(db));
    (uow.clone(), SqlOutboxStore::new(uow))
}

fn event(check_id: i64) -> NewOutboxEvent {
    NewOutboxEvent {
        event_type: "location_check".to_string(),
        payload: json!({ "check_id": check_id }),
        not_before: Utc::now() - ChronoDuration::seconds(1),
    }
}

async fn claim_at(
    uow: &UnitOfWork,
    limit: u64,
    now: chrono::DateTime<Utc>,
) -> Vec<ClaimedEvent> {
    uow.within_tx(Scope::Root, move |txn| {
        Box::pin(async move { OutboxRepository::new(txn).claim(limit, LEASE, now).await })
    })
    .await
    .unwrap()
}

#[tokio::test]
async fn test_enqueue_then_claim_sets_lease() {
    let (_, store) = setup().await;
    let id = store.enqueue(event(7)).await.unwrap();

    let claimed = store.claim_batch(10, LEASE).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
    assert_eq!(claimed[0].attempts, 1);
    assert_eq!(claimed[0].payload, json!({ "check_id": 7 }));

    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Processing);
    assert_eq!(stored.attempts, 1);
    assert!(stored.processing_until.is_some());

    // Lease still held
    assert!(store.claim_batch(10, LEASE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_skips_events_not_yet_due() {
    let (_, store) = setup().await;
    let mut later = event(1);
    later.not_before = Utc::now() + ChronoDuration::minutes(5);
    store.enqueue(later).await.unwrap();

    assert!(store.claim_batch(10, LEASE).await.unwrap().is_empty());
    assert_eq!(store.count_by_status(OutboxStatus::Pending).await.unwrap(), 1);
}

#[tokio::test]
async fn test_claims_are_disjoint_and_respect_limit() {
    let (_, store) = setup().await;
    for check_id in 0..5 {
        store.enqueue(event(check_id)).await.unwrap();
    }

    let first = store.claim_batch(3, LEASE).await.unwrap();
    let second = store.claim_batch(3, LEASE).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 2);
    for claimed in &first {
        assert!(second.iter().all(|other| other.id != claimed.id));
    }
    // Oldest first
    assert!(first.iter().all(|a| second.iter().all(|b| a.id < b.id)));
}

#[tokio::test]
async fn test_concurrent_claims_are_disjoint() {
    let (_, store) = setup().await;
    let mut expected = BTreeSet::new();
    for check_id in 0..5 {
        expected.insert(store.enqueue(event(check_id)).await.unwrap());
    }

    let (left, right) = tokio::join!(store.claim_batch(3, LEASE), store.claim_batch(3, LEASE));
    let (left, right) = (left.unwrap(), right.unwrap());

    let left_ids: BTreeSet<i64> = left.iter().map(|e| e.id).collect();
    let right_ids: BTreeSet<i64> = right.iter().map(|e| e.id).collect();
    assert!(left_ids.is_disjoint(&right_ids));
    let all: BTreeSet<i64> = left_ids.union(&right_ids).copied().collect();
    assert_eq!(all, expected);
    assert!(left.iter().chain(right.iter()).all(|e| e.attempts == 1));

    for id in expected {
        let stored = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.attempts, 1);
        assert_eq!(stored.status, OutboxStatus::Processing);
    }
}

#[tokio::test]
async fn test_lease_ending_exactly_now_is_reclaimable() {
    let (uow, store) = setup().await;
    let id = store.enqueue(event(1)).await.unwrap();

    let now = Utc::now();
    assert_eq!(claim_at(&uow, 10, now).await.len(), 1);

    // Still held one instant before the lease ends
    let just_before = now + ChronoDuration::seconds(30) - ChronoDuration::milliseconds(1);
    assert!(claim_at(&uow, 10, just_before).await.is_empty());

    let lease_end = now + ChronoDuration::seconds(30);
    let reclaimed = claim_at(&uow, 10, lease_end).await;
    assert_eq!(reclaimed.len(), 1);
    assert_eq!(reclaimed[0].id, id);
    assert_eq!(reclaimed[0].attempts, 2);
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed_with_new_fence() {
    let (uow, store) = setup().await;
    let id = store.enqueue(event(1)).await.unwrap();

    let now = Utc::now();
    let first = claim_at(&uow, 10, now).await;
    assert_eq!(first[0].attempts, 1);

    let after_lease = now + ChronoDuration::seconds(31);
    let second = claim_at(&uow, 10, after_lease).await;
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, id);
    assert_eq!(second[0].attempts, 2);

    // The first claimant finishing late must not overwrite the new lease
    store
        .reconcile(Reconciliation::Dispatched(first))
        .await
        .unwrap();
    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Processing);
    assert_eq!(stored.attempts, 2);

    store
        .reconcile(Reconciliation::Dispatched(second))
        .await
        .unwrap();
    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Dispatched);
    assert!(stored.processing_until.is_none());
}

#[tokio::test]
async fn test_reconcile_failure_retries_and_dead_letters() {
    let (_, store) = setup().await;
    let retry_id = store.enqueue(event(1)).await.unwrap();
    let dead_id = store.enqueue(event(2)).await.unwrap();
    let claimed = store.claim_batch(10, LEASE).await.unwrap();
    assert_eq!(claimed.len(), 2);

    let next_attempt_at = Utc::now() + ChronoDuration::seconds(2);
    store
        .reconcile(Reconciliation::Failed {
            decisions: vec![
                RetryDecision::Retry {
                    id: retry_id,
                    attempts: 1,
                    next_attempt_at,
                },
                RetryDecision::Dead {
                    id: dead_id,
                    attempts: 1,
                },
            ],
            last_error: "broker down".to_string(),
        })
        .await
        .unwrap();

    let retried = store.find_by_id(retry_id).await.unwrap().unwrap();
    assert_eq!(retried.status, OutboxStatus::Pending);
    assert_eq!(retried.last_error.as_deref(), Some("broker down"));
    assert!(retried.processing_until.is_none());
    assert!(retried.next_attempt_at > Utc::now());

    let dead = store.find_by_id(dead_id).await.unwrap().unwrap();
    assert_eq!(dead.status, OutboxStatus::Dead);
    assert_eq!(dead.attempts, 1);

    // Backoff not elapsed, dead never comes back
    assert!(store.claim_batch(10, LEASE).await.unwrap().is_empty());
    assert_eq!(store.count_by_status(OutboxStatus::Dead).await.unwrap(), 1);
}

#[tokio::test]
async fn test_rolled_back_transaction_leaves_no_event() {
    let (uow, store) = setup().await;

    let result: Result<i64, RepositoryError> = uow
        .within_tx(Scope::Root, |txn| {
            Box::pin(async move {
                OutboxRepository::new(txn).insert(event(9)).await?;
                Err(RepositoryError::NotFound)
            })
        })
        .await;

    assert!(matches!(result, Err(RepositoryError::NotFound)));
    assert_eq!(store.count_by_status(OutboxStatus::Pending).await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_missing_event() {
    let (_, store) = setup().await;
    assert!(store.find_by_id(404).await.unwrap().is_none());
}

#[tokio::test]
async fn test_stale_failure_does_not_reopen_finished_event() {
    let (uow, store) = setup().await;
    let id = store.enqueue(event(1)).await.unwrap();

    let now = Utc::now();
    let stale = claim_at(&uow, 10, now).await;
    let fresh = claim_at(&uow, 10, now + ChronoDuration::seconds(30)).await;
    store
        .reconcile(Reconciliation::Dispatched(fresh))
        .await
        .unwrap();

    store
        .reconcile(Reconciliation::Failed {
            decisions: vec![RetryDecision::Retry {
                id: stale[0].id,
                attempts: stale[0].attempts,
                next_attempt_at: now,
            }],
            last_error: "late failure".to_string(),
        })
        .await
        .unwrap();

    let stored = store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Dispatched);
    assert!(stored.status.is_terminal());
    assert_eq!(stored.attempts, 2);
    assert!(stored.last_error.is_none());
}
