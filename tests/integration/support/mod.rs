// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use geonotify::domain::models::location_check::{NearbyIncident, Point};
use geonotify::domain::repositories::location_check_repository::NearbyIncidentFinder;
use geonotify::domain::repositories::outbox_repository::RepositoryError;
use geonotify::domain::services::dedupe_service::{DedupeError, DedupeMarker, DedupeStore};
use geonotify::infrastructure::database::unit_of_work::UnitOfWork;
use geonotify::queue::event_stream::{
    BrokerConsumer, BrokerError, BrokerProducer, Delivery, StreamMessage,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::Database;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// 内存 SQLite 上的工作单元，已执行迁移
pub async fn setup_uow() -> UnitOfWork {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to open sqlite");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    UnitOfWork::new(Arc::new(db))
}

/// 固定返回给定事件的查询器
pub struct FixedFinder {
    pub ids: Vec<i64>,
}

#[async_trait]
impl NearbyIncidentFinder for FixedFinder {
    async fn find_nearby(
        &self,
        _point: Point,
        limit: u32,
    ) -> Result<Vec<NearbyIncident>, RepositoryError> {
        Ok(self
            .ids
            .iter()
            .take(limit as usize)
            .map(|id| NearbyIncident {
                incident_id: *id,
                title: format!("incident {}", id),
                distance_meters: 25.0,
            })
            .collect())
    }
}

#[derive(Default)]
struct StreamState {
    seq: u64,
    entries: Vec<Delivery>,
    cursor: usize,
    pending: BTreeMap<String, Instant>,
}

/// 带消费者组语义的内存消息流
///
/// 读到的消息进入待确认列表，空闲超过阈值后可被重新认领。
#[derive(Default)]
pub struct MemoryStream {
    state: Mutex<StreamState>,
    pub unavailable: AtomicBool,
}

impl MemoryStream {
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}

#[async_trait]
impl BrokerProducer for MemoryStream {
    async fn publish_batch(&self, messages: &[StreamMessage]) -> Result<(), BrokerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("stream offline".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        for message in messages {
            state.seq += 1;
            let id = format!("{}-0", state.seq);
            state.entries.push(Delivery::from((id, message.clone())));
        }
        Ok(())
    }
}

#[async_trait]
impl BrokerConsumer for MemoryStream {
    async fn ensure_group(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn reclaim(
        &self,
        _consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut state = self.state.lock().unwrap();
        let now = Instant::now();
        let idle: Vec<String> = state
            .pending
            .iter()
            .filter(|(_, since)| now.duration_since(**since) >= min_idle)
            .map(|(id, _)| id.clone())
            .take(count)
            .collect();
        let mut claimed = Vec::with_capacity(idle.len());
        for id in idle {
            state.pending.insert(id.clone(), now);
            if let Some(entry) = state.entries.iter().find(|e| e.id == id) {
                claimed.push(entry.clone());
            }
        }
        Ok(claimed)
    }

    async fn read(
        &self,
        _consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let batch = {
            let mut state = self.state.lock().unwrap();
            let end = (state.cursor + count).min(state.entries.len());
            let batch: Vec<Delivery> = state.entries[state.cursor..end].to_vec();
            state.cursor = end;
            let now = Instant::now();
            for delivery in &batch {
                state.pending.insert(delivery.id.clone(), now);
            }
            batch
        };
        // Mimic a blocking read on an empty stream
        if batch.is_empty() {
            tokio::time::sleep(block).await;
        }
        Ok(batch)
    }

    async fn ack(&self, id: &str) -> Result<(), BrokerError> {
        self.state.lock().unwrap().pending.remove(id);
        Ok(())
    }
}

/// 不过期的内存去重标记
#[derive(Default)]
pub struct MemoryDedupe {
    markers: Mutex<HashMap<String, DedupeMarker>>,
}

impl MemoryDedupe {
    pub fn marker(&self, key: &str) -> Option<DedupeMarker> {
        self.markers.lock().unwrap().get(key).copied()
    }

    pub fn expire(&self, key: &str) {
        self.markers.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl DedupeStore for MemoryDedupe {
    async fn try_begin(
        &self,
        key: &str,
        _ttl: Duration,
    ) -> Result<Option<DedupeMarker>, DedupeError> {
        let mut markers = self.markers.lock().unwrap();
        if let Some(existing) = markers.get(key) {
            return Ok(Some(*existing));
        }
        markers.insert(key.to_string(), DedupeMarker::InFlight);
        Ok(None)
    }

    async fn mark_delivered(&self, key: &str, _ttl: Duration) -> Result<(), DedupeError> {
        self.markers
            .lock()
            .unwrap()
            .insert(key.to_string(), DedupeMarker::Delivered);
        Ok(())
    }
}
