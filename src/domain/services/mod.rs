// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// - 去重服务（dedupe_service）：Webhook 投递的去重标记
/// - Webhook服务（webhook_service）：出站 Webhook 请求
pub mod dedupe_service;
pub mod webhook_service;
