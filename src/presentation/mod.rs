// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 表示层模块
///
/// 本地调试用的 Webhook 接收端的路由与处理器
pub mod handlers;
pub mod routes;
