// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// - 位置检查（location_check）：一次检查及其产生的业务事件
/// - 发件箱（outbox）：待可靠分发的事件及其生命周期
pub mod location_check;
pub mod outbox;
