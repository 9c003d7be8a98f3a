// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::services::webhook_service::{WebhookError, WebhookRequest, WebhookService};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_EVENT_TYPE: &str = "X-Event-Type";
pub const HEADER_IDEMPOTENCY_KEY: &str = "Idempotency-Key";
pub const HEADER_SIGNATURE: &str = "X-Signature-256";

/// 基于 HTTP 的 Webhook 服务实现
pub struct HttpWebhookService {
    /// HTTP 客户端
    client: reqwest::Client,
    /// 接收方 URL
    target_url: String,
    /// 签名密钥
    secret: Option<String>,
}

impl HttpWebhookService {
    /// 创建新的 Webhook 服务实现
    ///
    /// `timeout` 覆盖整个请求，包括读取响应。
    pub fn new(
        target_url: impl Into<String>,
        timeout: Duration,
        secret: Option<String>,
    ) -> Result<Self, WebhookError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebhookError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            target_url: target_url.into(),
            secret: secret.filter(|s| !s.is_empty()),
        })
    }

    /// 为请求体生成签名
    fn generate_signature(&self, body: &str) -> Option<String> {
        let secret = self.secret.as_ref()?;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
        mac.update(body.as_bytes());
        Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
    }
}

#[async_trait]
impl WebhookService for HttpWebhookService {
    async fn send_webhook(&self, request: &WebhookRequest) -> Result<u16, WebhookError> {
        let mut builder = self
            .client
            .post(&self.target_url)
            .header("Content-Type", "application/json")
            .header(HEADER_EVENT_TYPE, &request.event_type)
            .header(HEADER_IDEMPOTENCY_KEY, &request.idempotency_key);

        if let Some(signature) = self.generate_signature(&request.body) {
            builder = builder.header(HEADER_SIGNATURE, signature);
        }

        let response = builder
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| WebhookError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(WebhookError::Status(status.as_u16()))
        }
    }
}

#[cfg(test)]
#[path = "webhook_service_impl_test.rs"]
mod tests;
