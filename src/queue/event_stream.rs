// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 消息字段：事件类型
pub const FIELD_TYPE: &str = "type";
/// 消息字段：原样的事件体
pub const FIELD_BODY: &str = "body";
/// 消息字段：来源发件箱ID
pub const FIELD_OUTBOX_ID: &str = "outbox_id";

/// 消息流错误类型
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Redis错误
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// 消息流暂时不可用
    #[error("Broker unavailable: {0}")]
    Unavailable(String),
}

/// 推送到消息流的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub event_type: String,
    pub body: String,
    pub outbox_id: i64,
}

/// 消息解析错误
#[derive(Error, Debug, PartialEq, Eq)]
pub enum MessageDecodeError {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("invalid outbox_id '{0}'")]
    InvalidOutboxId(String),
}

/// 从消费者组读到的一条消息
///
/// 字段保持原始字符串形式，解析失败的消息由消费方决定如何处理。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// 消息流分配的消息ID，重投递之间保持不变
    pub id: String,
    pub fields: HashMap<String, String>,
}

impl Delivery {
    pub fn outbox_id(&self) -> Result<i64, MessageDecodeError> {
        let raw = self
            .fields
            .get(FIELD_OUTBOX_ID)
            .ok_or(MessageDecodeError::MissingField(FIELD_OUTBOX_ID))?;
        raw.parse::<i64>()
            .map_err(|_| MessageDecodeError::InvalidOutboxId(raw.clone()))
    }

    /// 解析为完整消息
    pub fn message(&self) -> Result<StreamMessage, MessageDecodeError> {
        let outbox_id = self.outbox_id()?;
        let event_type = self
            .fields
            .get(FIELD_TYPE)
            .ok_or(MessageDecodeError::MissingField(FIELD_TYPE))?
            .clone();
        let body = self
            .fields
            .get(FIELD_BODY)
            .ok_or(MessageDecodeError::MissingField(FIELD_BODY))?
            .clone();
        Ok(StreamMessage {
            event_type,
            body,
            outbox_id,
        })
    }
}

impl From<(String, StreamMessage)> for Delivery {
    fn from((id, message): (String, StreamMessage)) -> Self {
        let mut fields = HashMap::with_capacity(3);
        fields.insert(FIELD_TYPE.to_string(), message.event_type);
        fields.insert(FIELD_BODY.to_string(), message.body);
        fields.insert(FIELD_OUTBOX_ID.to_string(), message.outbox_id.to_string());
        Self { id, fields }
    }
}

/// 消息流生产端
#[async_trait]
pub trait BrokerProducer: Send + Sync {
    /// 以一次批量写入推送整批消息
    ///
    /// 要么整批成功，要么整批视为失败。
    async fn publish_batch(&self, messages: &[StreamMessage]) -> Result<(), BrokerError>;
}

/// 消息流消费端（消费者组成员）
#[async_trait]
pub trait BrokerConsumer: Send + Sync {
    /// 确保消费者组存在，可重复调用
    async fn ensure_group(&self) -> Result<(), BrokerError>;

    /// 将空闲超过 `min_idle` 的未确认消息转给 `consumer`
    async fn reclaim(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Delivery>, BrokerError>;

    /// 阻塞读取新消息，超时返回空列表
    async fn read(
        &self,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, BrokerError>;

    /// 确认消息
    async fn ack(&self, id: &str) -> Result<(), BrokerError>;
}

#[async_trait]
impl<T: BrokerProducer + ?Sized> BrokerProducer for Arc<T> {
    async fn publish_batch(&self, messages: &[StreamMessage]) -> Result<(), BrokerError> {
        (**self).publish_batch(messages).await
    }
}

#[async_trait]
impl<T: BrokerConsumer + ?Sized> BrokerConsumer for Arc<T> {
    async fn ensure_group(&self) -> Result<(), BrokerError> {
        (**self).ensure_group().await
    }

    async fn reclaim(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        (**self).reclaim(consumer, min_idle, count).await
    }

    async fn read(
        &self,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, BrokerError> {
        (**self).read(consumer, count, block).await
    }

    async fn ack(&self, id: &str) -> Result<(), BrokerError> {
        (**self).ack(id).await
    }
}
