// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 用例模块
///
/// - 位置检查（check_and_record）：记录检查并在同一事务中写入发件箱事件
pub mod check_and_record;
