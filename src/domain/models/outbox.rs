// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 发件箱事件
///
/// 与产生它的业务写入在同一事务中落库，在推送到消息流成功之前
/// 它是事件的唯一事实来源。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEvent {
    /// 存储分配的单调递增标识，不会复用
    pub id: i64,
    /// 负载类型标签，例如 `location_check`
    pub event_type: String,
    /// 序列化后的事件体
    pub payload: serde_json::Value,
    /// 生命周期状态
    pub status: OutboxStatus,
    /// 已认领次数
    pub attempts: i32,
    /// 最早可再次认领的时间
    pub next_attempt_at: DateTime<Utc>,
    /// 认领租约到期时间
    pub processing_until: Option<DateTime<Utc>>,
    /// 最近一次失败原因
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 待写入的发件箱事件
#[derive(Debug, Clone, PartialEq)]
pub struct NewOutboxEvent {
    pub event_type: String,
    pub payload: serde_json::Value,
    /// 早于该时间不会被认领
    pub not_before: DateTime<Utc>,
}

impl NewOutboxEvent {
    /// 序列化负载并构造待写入事件
    ///
    /// 序列化失败直接返回错误，调用方必须让业务事务失败而不是吞掉它。
    pub fn from_payload<T: Serialize>(
        event_type: impl Into<String>,
        payload: &T,
        not_before: DateTime<Utc>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            payload: serde_json::to_value(payload)?,
            not_before,
        })
    }
}

/// 被中继认领的事件
///
/// `attempts` 是认领后的值，同时充当该次租约的栅栏令牌：
/// 回写结果时只有尝试次数仍然匹配的行才会被更新。
#[derive(Debug, Clone, PartialEq)]
pub struct ClaimedEvent {
    pub id: i64,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub attempts: i32,
}

/// 发件箱事件状态
///
/// 只允许 `pending → processing → {dispatched | pending | dead}`，
/// 终态不会回退。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// 等待认领
    #[default]
    Pending,
    /// 已被某个中继实例认领
    Processing,
    /// 已推送到消息流
    Dispatched,
    /// 重试耗尽，保留供运维排查
    Dead,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Dispatched => "dispatched",
            OutboxStatus::Dead => "dead",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboxStatus::Dispatched | OutboxStatus::Dead)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OutboxStatus::Pending),
            "processing" => Ok(OutboxStatus::Processing),
            // Older rows may carry the alternative name
            "dispatched" | "succeeded" => Ok(OutboxStatus::Dispatched),
            "dead" => Ok(OutboxStatus::Dead),
            other => Err(format!("unknown outbox status: {}", other)),
        }
    }
}

/// 单次推送失败后对一个事件的处理决定
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// 放回待认领队列，等待退避时间后重试
    Retry {
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
    },
    /// 尝试次数耗尽，进入死信
    Dead { id: i64, attempts: i32 },
}

impl RetryDecision {
    pub fn id(&self) -> i64 {
        match self {
            RetryDecision::Retry { id, .. } | RetryDecision::Dead { id, .. } => *id,
        }
    }
}

/// 一轮中继结束后需要原子回写的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// 推送成功，所有事件标记为已分发
    Dispatched(Vec<ClaimedEvent>),
    /// 推送失败，逐个事件重试或进入死信
    Failed {
        decisions: Vec<RetryDecision>,
        last_error: String,
    },
}
