// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 处理器模块
///
/// - 接收端（receiver_handler）：本地调试用的 Webhook 接收端
pub mod receiver_handler;
