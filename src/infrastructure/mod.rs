// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 基础设施层模块
///
/// 该模块包含系统的技术实现细节，负责与外部系统的交互。
///
/// 包含的子模块：
/// - 缓存（cache）：Redis 去重标记
/// - 数据库（database）：数据库连接、实体映射和工作单元
/// - 可观测性（observability）：指标名称与描述
/// - 仓库实现（repositories）：领域仓库接口的具体实现
/// - 服务（services）：出站 Webhook 客户端
pub mod cache;
pub mod database;
pub mod observability;
pub mod repositories;
pub mod services;
