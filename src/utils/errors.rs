// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::outbox_repository::RepositoryError;
use crate::domain::services::dedupe_service::DedupeError;
use crate::queue::event_stream::BrokerError;
use thiserror::Error;

/// Worker错误类型
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("仓库错误: {0}")]
    Repository(#[from] RepositoryError),

    #[error("消息流错误: {0}")]
    Broker(#[from] BrokerError),

    #[error("去重存储错误: {0}")]
    Dedupe(#[from] DedupeError),
}
