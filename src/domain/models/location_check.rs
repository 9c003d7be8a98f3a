// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// 位置检查完成事件的类型标签
pub const LOCATION_CHECK_EVENT: &str = "location_check";

/// 单次检查最多匹配的事件数
pub const MAX_CHECK_LIMIT: u32 = 500;

/// 地理坐标点
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct Point {
    #[validate(range(min = -90.0, max = 90.0, message = "must be between -90 and 90"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "must be between -180 and 180"))]
    pub lon: f64,
}

/// 位置检查命令
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CheckCommand {
    /// 发起检查的用户
    #[validate(custom(function = "validate_not_blank"))]
    pub user_id: String,
    #[validate(nested)]
    pub point: Point,
    /// 最多返回的附近事件数
    #[validate(range(max = 500, message = "must be <= 500"))]
    pub limit: u32,
}

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("is required".into());
        return Err(err);
    }
    Ok(())
}

/// 附近的有效事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyIncident {
    pub incident_id: i64,
    pub title: String,
    pub distance_meters: f64,
}

/// 位置检查完成事件
///
/// 写入发件箱后即不可变；接收方收到的请求体就是它的 JSON 序列化结果。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckCompleted {
    /// 产生该事件的检查记录ID，也是下游幂等键
    pub check_id: i64,
    pub user_id: String,
    pub point: Point,
    /// 命中的事件ID列表
    pub incident_ids: Vec<i64>,
    pub occurred_at: DateTime<Utc>,
}

impl CheckCompleted {
    /// 下游接收方用于去重的幂等键
    pub fn idempotency_key(&self) -> String {
        self.check_id.to_string()
    }
}
