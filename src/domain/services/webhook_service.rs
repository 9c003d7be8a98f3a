// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// 一次出站 Webhook 请求
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookRequest {
    /// 写入 `X-Event-Type` 头
    pub event_type: String,
    /// 写入 `Idempotency-Key` 头，取自业务检查ID而非消息ID
    pub idempotency_key: String,
    /// 原样发送的事件体
    pub body: String,
}

/// Webhook 投递错误
#[derive(Error, Debug)]
pub enum WebhookError {
    /// 接收方返回了非 2xx 状态码
    #[error("webhook non-2xx: {0}")]
    Status(u16),
    /// 网络错误或超时
    #[error("webhook transport error: {0}")]
    Transport(String),
}

impl WebhookError {
    /// 用于指标标签的失败原因
    pub fn reason(&self) -> &'static str {
        match self {
            WebhookError::Status(_) => "http_error",
            WebhookError::Transport(_) => "network_error",
        }
    }
}

/// Webhook服务特质
///
/// 定义Webhook发送的核心逻辑
#[async_trait]
pub trait WebhookService: Send + Sync {
    /// 发送Webhook事件
    ///
    /// # 返回值
    ///
    /// * `Ok(u16)` - 接收方以 2xx 确认，返回状态码
    /// * `Err(WebhookError)` - 其他任何结果
    async fn send_webhook(&self, request: &WebhookRequest) -> Result<u16, WebhookError>;
}

#[async_trait]
impl<T: WebhookService + ?Sized> WebhookService for Arc<T> {
    async fn send_webhook(&self, request: &WebhookRequest) -> Result<u16, WebhookError> {
        (**self).send_webhook(request).await
    }
}
