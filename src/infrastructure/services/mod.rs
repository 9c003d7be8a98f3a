// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施服务模块
///
/// 提供出站 Webhook 的 HTTP 实现
pub mod webhook_service_impl;
