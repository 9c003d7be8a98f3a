// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// 去重标记的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupeMarker {
    /// 某个工作器正在投递，或投递途中崩溃
    InFlight,
    /// 接收方已确认投递成功
    Delivered,
}

impl DedupeMarker {
    pub fn as_str(&self) -> &'static str {
        match self {
            DedupeMarker::InFlight => "in_flight",
            DedupeMarker::Delivered => "delivered",
        }
    }

    /// 解析存储中的标记值
    ///
    /// 无法识别的值按已投递处理，宁可少投也不重复投递。
    pub fn parse(value: &str) -> Self {
        match value {
            "in_flight" => DedupeMarker::InFlight,
            _ => DedupeMarker::Delivered,
        }
    }
}

impl fmt::Display for DedupeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 去重存储错误
#[derive(Error, Debug)]
pub enum DedupeError {
    #[error("Dedupe store error: {0}")]
    Store(String),
}

/// 去重标记存储
///
/// 标记只由 Webhook 分发工作器写入，依赖过期自动清除，从不显式删除。
/// “不存在才写入”本身就是并发工作器之间的串行化点。
#[async_trait]
pub trait DedupeStore: Send + Sync {
    /// 尝试写入进行中标记
    ///
    /// # 返回值
    ///
    /// * `Ok(None)` - 标记写入成功，调用方获得投递权
    /// * `Ok(Some(marker))` - 标记已存在，返回现有状态
    async fn try_begin(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<DedupeMarker>, DedupeError>;

    /// 将标记覆盖为已投递，并设置较长的存活时间
    async fn mark_delivered(&self, key: &str, ttl: Duration) -> Result<(), DedupeError>;
}

#[async_trait]
impl<T: DedupeStore + ?Sized> DedupeStore for Arc<T> {
    async fn try_begin(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<DedupeMarker>, DedupeError> {
        (**self).try_begin(key, ttl).await
    }

    async fn mark_delivered(&self, key: &str, ttl: Duration) -> Result<(), DedupeError> {
        (**self).mark_delivered(key, ttl).await
    }
}

/// 由发件箱ID计算去重键
pub fn dedupe_key(outbox_id: i64) -> String {
    format!("webhook:dispatch:{}", outbox_id)
}
