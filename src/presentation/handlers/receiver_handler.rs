// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::infrastructure::services::webhook_service_impl::{
    HEADER_EVENT_TYPE, HEADER_IDEMPOTENCY_KEY, HEADER_SIGNATURE,
};
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use serde_json::{Map, Value};
use tracing::{info, warn};

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-")
}

/// 接收 Webhook 并打印
///
/// 请求体必须是 JSON 对象，否则返回 400。
pub async fn receive_webhook(headers: HeaderMap, body: Bytes) -> (StatusCode, &'static str) {
    let payload: Map<String, Value> = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Invalid JSON");
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    let payload = Value::Object(payload);
    info!(
        event_type = header(&headers, HEADER_EVENT_TYPE),
        idempotency_key = header(&headers, HEADER_IDEMPOTENCY_KEY),
        signature = header(&headers, HEADER_SIGNATURE),
        payload = %payload,
        "Received webhook"
    );

    (StatusCode::OK, "OK")
}
