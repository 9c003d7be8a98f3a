// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::config::settings::OutboxSettings;
use crate::domain::models::outbox::{Reconciliation, RetryDecision};
use crate::domain::repositories::outbox_repository::{BatchClaimer, RepositoryError};
use crate::infrastructure::observability::metrics as names;
use crate::queue::event_stream::{BrokerProducer, StreamMessage};
use crate::utils::errors::WorkerError;
use crate::utils::retry_policy::RetryPolicy;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 一轮中继的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayRound {
    pub claimed: usize,
    pub dispatched: usize,
    pub retried: usize,
    pub dead: usize,
}

/// 发件箱中继
///
/// 周期性地认领到期事件，整批推送到消息流，再把结果回写到发件箱。
/// 多个实例可以并发运行，认领互不相交。
pub struct OutboxRelay<C: BatchClaimer, P: BrokerProducer> {
    claimer: C,
    producer: P,
    policy: RetryPolicy,
    batch_size: u64,
    poll_interval: Duration,
    lease: Duration,
}

impl<C: BatchClaimer, P: BrokerProducer> OutboxRelay<C, P> {
    pub fn new(claimer: C, producer: P, settings: &OutboxSettings) -> Self {
        Self {
            claimer,
            producer,
            policy: RetryPolicy::new(settings.max_attempts),
            batch_size: settings.batch_size,
            poll_interval: settings.poll_interval(),
            lease: settings.lease(),
        }
    }

    /// 执行一轮：认领、推送、回写
    pub async fn process_once(&self) -> Result<RelayRound, WorkerError> {
        let events = self.claimer.claim_batch(self.batch_size, self.lease).await?;
        if events.is_empty() {
            return Ok(RelayRound::default());
        }

        let mut round = RelayRound {
            claimed: events.len(),
            ..Default::default()
        };
        counter!(names::RELAY_CLAIMED).increment(events.len() as u64);

        let messages = events
            .iter()
            .map(|event| {
                Ok(StreamMessage {
                    event_type: event.event_type.clone(),
                    body: serde_json::to_string(&event.payload)?,
                    outbox_id: event.id,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        match self.producer.publish_batch(&messages).await {
            Ok(()) => {
                round.dispatched = events.len();
                self.claimer
                    .reconcile(Reconciliation::Dispatched(events))
                    .await?;
                counter!(names::RELAY_DISPATCHED).increment(round.dispatched as u64);
                debug!(count = round.dispatched, "Outbox batch dispatched");
            }
            Err(e) => {
                let now = Utc::now();
                let decisions: Vec<RetryDecision> = events
                    .iter()
                    .map(|event| self.policy.decide(event, now))
                    .collect();
                for decision in &decisions {
                    match decision {
                        RetryDecision::Retry { .. } => round.retried += 1,
                        RetryDecision::Dead { id, attempts } => {
                            round.dead += 1;
                            error!(id, attempts, "Outbox event moved to dead state");
                        }
                    }
                }
                warn!(
                    error = %e,
                    retried = round.retried,
                    dead = round.dead,
                    "Failed to publish outbox batch"
                );
                self.claimer
                    .reconcile(Reconciliation::Failed {
                        decisions,
                        last_error: e.to_string(),
                    })
                    .await?;
                counter!(names::RELAY_RETRIED).increment(round.retried as u64);
                counter!(names::RELAY_DEAD).increment(round.dead as u64);
            }
        }

        Ok(round)
    }
}

#[async_trait]
impl<C: BatchClaimer, P: BrokerProducer> Worker for OutboxRelay<C, P> {
    async fn run(&self, token: CancellationToken) -> Result<(), WorkerError> {
        info!(
            batch_size = self.batch_size,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Outbox relay started"
        );
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    info!("Outbox relay stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.process_once().await {
                        // A full batch means more work is likely waiting
                        Ok(round) if round.claimed as u64 >= self.batch_size => {
                            ticker.reset_immediately();
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "Outbox relay round failed"),
                    }
                }
            }
        }
    }

    fn name(&self) -> &str {
        "outbox-relay"
    }
}

#[cfg(test)]
#[path = "outbox_relay_test.rs"]
mod tests;
