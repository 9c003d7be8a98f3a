// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::outbox::{ClaimedEvent, NewOutboxEvent, Reconciliation};
use async_trait::async_trait;
use sea_orm::DbErr;
use std::time::Duration;
use thiserror::Error;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
    /// 负载序列化失败
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// 存储中的数据无法映射为领域模型
    #[error("Corrupted record {id}: {reason}")]
    Corrupted { id: i64, reason: String },
    /// 参数超出存储可表示的范围
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// 发件箱写入端
///
/// 实现必须复用调用方已打开的事务，让事件与业务写入一起提交或回滚。
#[async_trait]
pub trait OutboxEnqueuer: Send + Sync {
    /// 写入一条待分发事件，返回存储分配的ID
    async fn enqueue(&self, event: NewOutboxEvent) -> Result<i64, RepositoryError>;
}

/// 中继使用的批量认领接口
#[async_trait]
pub trait BatchClaimer: Send + Sync {
    /// 在一个事务中认领最多 `limit` 条可处理事件并为其设置租约
    ///
    /// 可处理指：待认领且到达重试时间，或处理中但租约已过期。
    /// 并发认领者之间拿到的行集合互不相交。
    async fn claim_batch(
        &self,
        limit: u64,
        lease: Duration,
    ) -> Result<Vec<ClaimedEvent>, RepositoryError>;

    /// 在一个事务中回写本轮推送结果
    async fn reconcile(&self, outcome: Reconciliation) -> Result<(), RepositoryError>;
}
