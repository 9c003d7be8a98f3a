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

use crate::config::settings::WebhookSettings;
use crate::domain::models::location_check::{CheckCompleted, LOCATION_CHECK_EVENT};
use crate::domain::services::dedupe_service::{dedupe_key, DedupeMarker, DedupeStore};
use crate::domain::services::webhook_service::{WebhookRequest, WebhookService};
use crate::infrastructure::observability::metrics as names;
use crate::queue::event_stream::{BrokerConsumer, Delivery, StreamMessage};
use crate::utils::errors::WorkerError;
use crate::workers::worker::Worker;
use async_trait::async_trait;
use metrics::{counter, histogram};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 出错后重新读取前的等待时间
const ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// 单条消息的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// 接收方返回 2xx，消息已确认
    Delivered,
    /// 之前已投递成功，未发请求直接确认
    Duplicate,
    /// 其他工作器正在投递，保持未确认
    InFlight,
    /// 无法解析，记录后确认丢弃
    Poison,
    /// 投递失败，保持未确认等待重新认领
    Failed,
}

/// Webhook 工作器配置
#[derive(Debug, Clone)]
pub struct WebhookWorkerConfig {
    /// 消费者组内的名称
    pub consumer: String,
    pub read_count: usize,
    pub block: Duration,
    pub reclaim_idle: Duration,
    pub in_flight_ttl: Duration,
    pub dedupe_ttl: Duration,
}

impl WebhookWorkerConfig {
    /// 由配置生成第 `index` 个工作器的配置
    pub fn from_settings(settings: &WebhookSettings, index: usize) -> Self {
        Self {
            consumer: format!("{}-{}", settings.consumer_name, index),
            read_count: settings.read_count,
            block: settings.block(),
            reclaim_idle: settings.reclaim_idle(),
            in_flight_ttl: settings.in_flight_ttl(),
            dedupe_ttl: settings.dedupe_ttl(),
        }
    }
}

/// Webhook 分发工作器
///
/// 从消费者组读取消息并投递到接收方。只有在接收方确认之后才确认消息；
/// 去重标记保证同一发件箱事件至多一次成功投递，崩溃或失败的消息
/// 在空闲超过 `reclaim_idle` 后被组内任意成员重新认领。
pub struct WebhookWorker<B, D, S>
where
    B: BrokerConsumer,
    D: DedupeStore,
    S: WebhookService,
{
    broker: B,
    dedupe: D,
    sender: S,
    config: WebhookWorkerConfig,
}

impl<B, D, S> WebhookWorker<B, D, S>
where
    B: BrokerConsumer,
    D: DedupeStore,
    S: WebhookService,
{
    /// 创建新的Webhook工作器实例
    pub fn new(broker: B, dedupe: D, sender: S, config: WebhookWorkerConfig) -> Self {
        Self {
            broker,
            dedupe,
            sender,
            config,
        }
    }

    /// 先认领空闲过久的未确认消息，没有时再读新消息
    async fn fetch(&self) -> Result<Vec<Delivery>, WorkerError> {
        let reclaimed = self
            .broker
            .reclaim(
                &self.config.consumer,
                self.config.reclaim_idle,
                self.config.read_count,
            )
            .await?;
        if !reclaimed.is_empty() {
            debug!(
                consumer = %self.config.consumer,
                count = reclaimed.len(),
                "Reclaimed idle messages"
            );
            return Ok(reclaimed);
        }

        Ok(self
            .broker
            .read(
                &self.config.consumer,
                self.config.read_count,
                self.config.block,
            )
            .await?)
    }

    /// 读取并处理一批消息
    pub async fn poll_once(&self) -> Result<Vec<DispatchOutcome>, WorkerError> {
        let deliveries = self.fetch().await?;
        let mut outcomes = Vec::with_capacity(deliveries.len());
        for delivery in &deliveries {
            outcomes.push(self.handle_delivery(delivery).await?);
        }
        Ok(outcomes)
    }

    /// 处理单条消息
    ///
    /// 返回错误时消息保持未确认。
    pub async fn handle_delivery(
        &self,
        delivery: &Delivery,
    ) -> Result<DispatchOutcome, WorkerError> {
        let decoded = delivery
            .message()
            .map_err(|e| e.to_string())
            .and_then(|message| {
                let key = business_key(&message)?;
                Ok((message, key))
            });
        let (message, idempotency_key) = match decoded {
            Ok(decoded) => decoded,
            Err(reason) => {
                error!(message_id = %delivery.id, %reason, "Dropping undecodable message");
                counter!(names::POISON_MESSAGES).increment(1);
                self.broker.ack(&delivery.id).await?;
                return Ok(DispatchOutcome::Poison);
            }
        };
        let key = dedupe_key(message.outbox_id);

        match self.dedupe.try_begin(&key, self.config.in_flight_ttl).await? {
            Some(DedupeMarker::Delivered) => {
                debug!(outbox_id = message.outbox_id, "Already delivered, acknowledging");
                counter!(names::DUPLICATE_SKIPPED).increment(1);
                self.broker.ack(&delivery.id).await?;
                return Ok(DispatchOutcome::Duplicate);
            }
            Some(DedupeMarker::InFlight) => {
                debug!(
                    outbox_id = message.outbox_id,
                    "Delivery in flight elsewhere, leaving pending"
                );
                return Ok(DispatchOutcome::InFlight);
            }
            None => {}
        }

        let request = WebhookRequest {
            event_type: message.event_type,
            idempotency_key,
            body: message.body,
        };

        counter!(names::DELIVERY_ATTEMPTS).increment(1);
        let start = Instant::now();
        let result = self.sender.send_webhook(&request).await;
        histogram!(names::DELIVERY_DURATION).record(start.elapsed().as_secs_f64());

        match result {
            Ok(status) => {
                if let Err(e) = self
                    .dedupe
                    .mark_delivered(&key, self.config.dedupe_ttl)
                    .await
                {
                    warn!(
                        outbox_id = message.outbox_id,
                        error = %e,
                        "Failed to record delivered marker"
                    );
                }
                self.broker.ack(&delivery.id).await?;
                counter!(names::DELIVERY_SUCCESS).increment(1);
                info!(
                    outbox_id = message.outbox_id,
                    status,
                    idempotency_key = %request.idempotency_key,
                    "Webhook delivered"
                );
                Ok(DispatchOutcome::Delivered)
            }
            Err(e) => {
                counter!(names::DELIVERY_FAILED, "reason" => e.reason()).increment(1);
                warn!(
                    outbox_id = message.outbox_id,
                    error = %e,
                    "Webhook delivery failed, leaving message pending"
                );
                Ok(DispatchOutcome::Failed)
            }
        }
    }
}

/// 从事件体中取出业务幂等键
fn business_key(message: &StreamMessage) -> Result<String, String> {
    match message.event_type.as_str() {
        LOCATION_CHECK_EVENT => serde_json::from_str::<CheckCompleted>(&message.body)
            .map(|event| event.idempotency_key())
            .map_err(|e| format!("invalid {} body: {}", LOCATION_CHECK_EVENT, e)),
        other => Err(format!("unknown event type '{}'", other)),
    }
}

#[async_trait]
impl<B, D, S> Worker for WebhookWorker<B, D, S>
where
    B: BrokerConsumer,
    D: DedupeStore,
    S: WebhookService,
{
    async fn run(&self, token: CancellationToken) -> Result<(), WorkerError> {
        loop {
            let ready = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                result = self.broker.ensure_group() => result,
            };
            match ready {
                Ok(()) => break,
                Err(e) => {
                    error!(error = %e, "Failed to create consumer group");
                    tokio::select! {
                        _ = token.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }
        info!(consumer = %self.config.consumer, "Webhook worker started");

        loop {
            let fetched = tokio::select! {
                _ = token.cancelled() => break,
                fetched = self.fetch() => fetched,
            };

            match fetched {
                Ok(deliveries) => {
                    for delivery in &deliveries {
                        if let Err(e) = self.handle_delivery(delivery).await {
                            error!(message_id = %delivery.id, error = %e, "Failed to handle message");
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to read from stream");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        info!(consumer = %self.config.consumer, "Webhook worker stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.consumer
    }
}

#[cfg(test)]
#[path = "webhook_worker_test.rs"]
mod tests;
