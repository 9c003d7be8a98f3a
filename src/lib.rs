// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 应用程序模块
///
/// 包含位置检查用例，负责把业务写入与发件箱事件放进同一事务
pub mod application;

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含核心业务实体、服务和仓库接口
pub mod domain;

/// 基础设施模块
///
/// 提供外部服务集成，如数据库、Redis 和出站 HTTP
pub mod infrastructure;

/// 表示层模块
///
/// 本地调试用的 Webhook 接收端
pub mod presentation;

/// 队列模块
///
/// 事件流的生产与消费
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现发件箱中继、Webhook 分发和工作器管理
pub mod workers;
