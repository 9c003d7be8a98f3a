// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供事件流的生产与消费接口以及 Redis Streams 实现
pub mod event_stream;
pub mod redis_stream;
