// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 基于 Redis 的 Webhook 去重标记存储
pub mod redis_client;
