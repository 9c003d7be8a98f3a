// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::dedupe_service::{DedupeError, DedupeMarker, DedupeStore};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::time::Duration;

/// 不存在则写入，存在则返回现有值
const TRY_BEGIN_SCRIPT: &str = r#"
local existing = redis.call('GET', KEYS[1])
if existing then
    return existing
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
return false
"#;

/// Redis客户端
///
/// 保存 Webhook 投递的去重标记
#[derive(Clone)]
pub struct RedisClient {
    /// Redis客户端
    client: redis::Client,
}

impl RedisClient {
    /// 创建新的Redis客户端实例
    ///
    /// # 参数
    ///
    /// * `redis_url` - Redis连接URL
    pub fn new(redis_url: &str) -> Result<Self, DedupeError> {
        let client = redis::Client::open(redis_url).map_err(store_error)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, DedupeError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(store_error)
    }
}

fn store_error(e: redis::RedisError) -> DedupeError {
    DedupeError::Store(e.to_string())
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl DedupeStore for RedisClient {
    async fn try_begin(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<DedupeMarker>, DedupeError> {
        let mut conn = self.connection().await?;
        let existing: Option<String> = redis::Script::new(TRY_BEGIN_SCRIPT)
            .key(key)
            .arg(DedupeMarker::InFlight.as_str())
            .arg(ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(existing.as_deref().map(DedupeMarker::parse))
    }

    async fn mark_delivered(&self, key: &str, ttl: Duration) -> Result<(), DedupeError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, DedupeMarker::Delivered.as_str(), ttl_secs(ttl))
            .await
            .map_err(store_error)?;
        Ok(())
    }
}
