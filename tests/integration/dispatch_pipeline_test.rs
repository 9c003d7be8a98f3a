// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::support::{setup_uow, FixedFinder, MemoryDedupe, MemoryStream};
use chrono::{Duration as ChronoDuration, Utc};
use geonotify::application::use_cases::check_and_record::{CheckError, LocationCheckService};
use geonotify::config::settings::OutboxSettings;
use geonotify::domain::models::location_check::{CheckCommand, CheckCompleted, Point};
use geonotify::domain::models::outbox::OutboxStatus;
use geonotify::domain::repositories::outbox_repository::RepositoryError;
use geonotify::domain::services::dedupe_service::{dedupe_key, DedupeMarker};
use geonotify::infrastructure::database::entities::outbox_event;
use geonotify::infrastructure::database::unit_of_work::{Scope, UnitOfWork};
use geonotify::infrastructure::repositories::outbox_repo_impl::SqlOutboxStore;
use geonotify::infrastructure::services::webhook_service_impl::HttpWebhookService;
use geonotify::queue::event_stream::{BrokerProducer, StreamMessage};
use geonotify::workers::manager::WorkerManager;
use geonotify::workers::outbox_relay::OutboxRelay;
use geonotify::workers::webhook_worker::{DispatchOutcome, WebhookWorker, WebhookWorkerConfig};
use sea_orm::sea_query::Expr;
use sea_orm::EntityTrait;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

type Relay = OutboxRelay<SqlOutboxStore, Arc<MemoryStream>>;
type Dispatcher = WebhookWorker<Arc<MemoryStream>, Arc<MemoryDedupe>, Arc<HttpWebhookService>>;

struct Pipeline {
    uow: UnitOfWork,
    store: SqlOutboxStore,
    stream: Arc<MemoryStream>,
    dedupe: Arc<MemoryDedupe>,
    service: LocationCheckService<FixedFinder>,
    relay: Relay,
    worker: Dispatcher,
    server: MockServer,
}

fn outbox_settings(max_attempts: i32) -> OutboxSettings {
    OutboxSettings {
        batch_size: 10,
        poll_interval_ms: 10,
        lease_secs: 30,
        max_attempts,
    }
}

fn worker_config() -> WebhookWorkerConfig {
    WebhookWorkerConfig {
        consumer: "dispatcher-0".to_string(),
        read_count: 10,
        block: Duration::from_millis(10),
        reclaim_idle: Duration::ZERO,
        in_flight_ttl: Duration::from_secs(30),
        dedupe_ttl: Duration::from_secs(86_400),
    }
}

async fn pipeline(incidents: &[i64], max_attempts: i32) -> Pipeline {
    let uow = setup_uow().await;
    let store = SqlOutboxStore::new(uow.clone());
    let stream = Arc::new(MemoryStream::default());
    let dedupe = Arc::new(MemoryDedupe::default());
    let server = MockServer::start().await;

    let sender = HttpWebhookService::new(
        format!("{}/webhook", server.uri()),
        Duration::from_secs(2),
        Some("integration-secret".to_string()),
    )
    .expect("Failed to build webhook client");

    Pipeline {
        service: LocationCheckService::new(
            uow.clone(),
            FixedFinder {
                ids: incidents.to_vec(),
            },
        ),
        relay: OutboxRelay::new(store.clone(), stream.clone(), &outbox_settings(max_attempts)),
        worker: WebhookWorker::new(
            stream.clone(),
            dedupe.clone(),
            Arc::new(sender),
            worker_config(),
        ),
        uow,
        store,
        stream,
        dedupe,
        server,
    }
}

fn command() -> CheckCommand {
    CheckCommand {
        user_id: "rider-17".to_string(),
        point: Point {
            lat: 48.8566,
            lon: 2.3522,
        },
        limit: 0,
    }
}

async fn respond_with(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn expire_backoff(uow: &UnitOfWork) {
    let past: sea_orm::prelude::DateTimeWithTimeZone =
        (Utc::now() - ChronoDuration::seconds(1)).into();
    outbox_event::Entity::update_many()
        .col_expr(outbox_event::Column::NextAttemptAt, Expr::value(past))
        .exec(uow.connection())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_check_is_delivered_once_end_to_end() {
    let p = pipeline(&[11, 12], 5).await;

    let result = p.service.check_and_record(command()).await.unwrap();
    let outbox_id = result.outbox_id.expect("matched check should enqueue");

    let idempotency_key = result.check_id.to_string();
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(header("Idempotency-Key", idempotency_key.as_str()))
        .and(header("X-Event-Type", "location_check"))
        .and(header_exists("X-Signature-256"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&p.server)
        .await;

    let round = p.relay.process_once().await.unwrap();
    assert_eq!(round.dispatched, 1);
    assert_eq!(p.stream.len(), 1);

    let outcomes = p.worker.poll_once().await.unwrap();
    assert_eq!(outcomes, vec![DispatchOutcome::Delivered]);
    assert_eq!(p.stream.pending(), 0);
    assert_eq!(
        p.dedupe.marker(&dedupe_key(outbox_id)),
        Some(DedupeMarker::Delivered)
    );

    let requests = p.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: CheckCompleted = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body.check_id, result.check_id);
    assert_eq!(body.incident_ids, vec![11, 12]);

    let stored = p.store.find_by_id(outbox_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Dispatched);
}

#[tokio::test]
async fn test_unmatched_check_sends_nothing() {
    let p = pipeline(&[], 5).await;
    respond_with(&p.server, 200).await;

    let result = p.service.check_and_record(command()).await.unwrap();
    assert!(result.outbox_id.is_none());

    assert_eq!(p.relay.process_once().await.unwrap().claimed, 0);
    assert!(p.worker.poll_once().await.unwrap().is_empty());
    assert!(p.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_publish_posts_once() {
    let p = pipeline(&[], 5).await;
    respond_with(&p.server, 200).await;

    let body = serde_json::to_string(&CheckCompleted {
        check_id: 900,
        user_id: "rider-17".to_string(),
        point: command().point,
        incident_ids: vec![4],
        occurred_at: Utc::now(),
    })
    .unwrap();
    let message = StreamMessage {
        event_type: "location_check".to_string(),
        body,
        outbox_id: 42,
    };
    // A relay that crashed after publishing but before reconciling publishes again
    p.stream.publish_batch(&[message.clone()]).await.unwrap();
    p.stream.publish_batch(&[message]).await.unwrap();

    let outcomes = p.worker.poll_once().await.unwrap();
    assert_eq!(
        outcomes,
        vec![DispatchOutcome::Delivered, DispatchOutcome::Duplicate]
    );
    assert_eq!(p.server.received_requests().await.unwrap().len(), 1);
    assert_eq!(p.stream.pending(), 0);
}

#[tokio::test]
async fn test_receiver_outage_is_retried_after_reclaim() {
    let p = pipeline(&[3], 5).await;
    respond_with(&p.server, 503).await;

    let result = p.service.check_and_record(command()).await.unwrap();
    let outbox_id = result.outbox_id.unwrap();
    p.relay.process_once().await.unwrap();

    let outcomes = p.worker.poll_once().await.unwrap();
    assert_eq!(outcomes, vec![DispatchOutcome::Failed]);
    assert_eq!(p.stream.pending(), 1);

    // In-flight marker has lapsed and the receiver is back
    p.dedupe.expire(&dedupe_key(outbox_id));
    p.server.reset().await;
    respond_with(&p.server, 200).await;

    let outcomes = p.worker.poll_once().await.unwrap();
    assert_eq!(outcomes, vec![DispatchOutcome::Delivered]);
    assert_eq!(p.stream.pending(), 0);
    assert_eq!(p.server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_stream_dead_letters_event() {
    let p = pipeline(&[8], 3).await;
    p.stream
        .unavailable
        .store(true, std::sync::atomic::Ordering::SeqCst);

    let outbox_id = p
        .service
        .check_and_record(command())
        .await
        .unwrap()
        .outbox_id
        .unwrap();

    for _ in 0..2 {
        assert_eq!(p.relay.process_once().await.unwrap().retried, 1);
        expire_backoff(&p.uow).await;
    }
    let round = p.relay.process_once().await.unwrap();
    assert_eq!(round.dead, 1);

    let stored = p.store.find_by_id(outbox_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Dead);
    assert_eq!(stored.attempts, 3);
    assert!(stored.last_error.unwrap().contains("stream offline"));

    expire_backoff(&p.uow).await;
    assert_eq!(p.relay.process_once().await.unwrap().claimed, 0);
    assert_eq!(p.stream.len(), 0);
}

#[tokio::test]
async fn test_rolled_back_check_never_reaches_stream() {
    let p = pipeline(&[5], 5).await;
    let service = Arc::new(p.service);

    let result: Result<(), CheckError> = p
        .uow
        .within_tx(Scope::Root, move |txn| {
            Box::pin(async move {
                service.check_and_record_in(Scope::Tx(txn), command()).await?;
                Err(CheckError::Repository(RepositoryError::NotFound))
            })
        })
        .await;
    assert!(result.is_err());

    assert_eq!(p.store.count_by_status(OutboxStatus::Pending).await.unwrap(), 0);
    assert_eq!(p.relay.process_once().await.unwrap().claimed, 0);
    assert_eq!(p.stream.len(), 0);
}

#[tokio::test]
async fn test_running_workers_deliver_until_shutdown() {
    let Pipeline {
        service,
        store,
        relay,
        worker,
        server,
        ..
    } = pipeline(&[21], 5).await;
    respond_with(&server, 200).await;

    let outbox_id = service
        .check_and_record(command())
        .await
        .unwrap()
        .outbox_id
        .unwrap();

    let mut manager = WorkerManager::new(Duration::from_secs(2));
    manager.spawn(relay);
    manager.spawn(worker);
    assert_eq!(manager.len(), 2);

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if !server.received_requests().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "webhook was not delivered in time");

    manager.shutdown().await;

    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    let stored = store.find_by_id(outbox_id).await.unwrap().unwrap();
    assert_eq!(stored.status, OutboxStatus::Dispatched);
}
