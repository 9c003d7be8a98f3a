// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::receiver_handler;
use axum::{
    routing::{get, post},
    Router,
};

/// 创建接收端路由
///
/// # 参数
///
/// * `path` - 接收 Webhook 的路径，例如 `/webhook`
pub fn receiver_routes(path: &str) -> Router {
    let router = Router::new().route(path, post(receiver_handler::receive_webhook));
    if path == "/health" {
        return router;
    }
    router.route("/health", get(health_check))
}

/// 健康检查端点
///
/// # 返回值
///
/// 返回"OK"字符串
pub async fn health_check() -> &'static str {
    "OK"
}
