// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::event_stream::{
    BrokerConsumer, BrokerError, BrokerProducer, Delivery, StreamMessage, FIELD_BODY,
    FIELD_OUTBOX_ID, FIELD_TYPE,
};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{
    StreamAutoClaimOptions, StreamAutoClaimReply, StreamId, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// 基于 Redis Streams 的事件流
///
/// 同一个实例的阻塞读会占住底层多路复用连接，
/// 每个消费工作器应持有自己的实例。
#[derive(Clone)]
pub struct RedisEventStream {
    conn: MultiplexedConnection,
    stream: String,
    group: String,
}

impl RedisEventStream {
    /// 连接到 Redis 并绑定消息流与消费者组
    pub async fn connect(
        redis_url: &str,
        stream: impl Into<String>,
        group: impl Into<String>,
    ) -> Result<Self, BrokerError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            stream: stream.into(),
            group: group.into(),
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    fn to_delivery(entry: &StreamId) -> Delivery {
        let mut fields = HashMap::with_capacity(entry.map.len());
        for key in entry.map.keys() {
            match entry.get::<String>(key) {
                Some(value) => {
                    fields.insert(key.clone(), value);
                }
                None => warn!(message_id = %entry.id, field = %key, "Non-string stream field"),
            }
        }
        Delivery {
            id: entry.id.clone(),
            fields,
        }
    }
}

#[async_trait]
impl BrokerProducer for RedisEventStream {
    async fn publish_batch(&self, messages: &[StreamMessage]) -> Result<(), BrokerError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for message in messages {
            let outbox_id = message.outbox_id.to_string();
            pipe.xadd(
                &self.stream,
                "*",
                &[
                    (FIELD_TYPE, message.event_type.as_str()),
                    (FIELD_BODY, message.body.as_str()),
                    (FIELD_OUTBOX_ID, outbox_id.as_str()),
                ],
            )
            .ignore();
        }

        let mut conn = self.conn.clone();
        pipe.query_async::<()>(&mut conn).await?;
        debug!(stream = %self.stream, count = messages.len(), "Published batch to stream");
        Ok(())
    }
}

#[async_trait]
impl BrokerConsumer for RedisEventStream {
    async fn ensure_group(&self) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.stream, &self.group, "0")
            .await;
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn reclaim(
        &self,
        consumer: &str,
        min_idle: Duration,
        count: usize,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut conn = self.conn.clone();
        let options = StreamAutoClaimOptions::default().count(count);
        let reply: StreamAutoClaimReply = conn
            .xautoclaim_options(
                &self.stream,
                &self.group,
                consumer,
                min_idle.as_millis() as u64,
                "0-0",
                options,
            )
            .await?;
        Ok(reply.claimed.iter().map(Self::to_delivery).collect())
    }

    async fn read(
        &self,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<Delivery>, BrokerError> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(&self.group, consumer)
            .count(count)
            .block(block.as_millis() as usize);
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream], &[">"], &options)
            .await?;

        Ok(reply
            .map(|reply| {
                reply
                    .keys
                    .iter()
                    .flat_map(|key| key.ids.iter().map(Self::to_delivery))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ack(&self, id: &str) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(&self.stream, &self.group, &[id]).await?;
        Ok(())
    }
}
