// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::outbox::{ClaimedEvent, RetryDecision};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 中继推送失败后的重试策略
///
/// 退避时间为 `2^attempts` 秒，下限为 `initial_backoff`，上限为 `max_backoff`。
/// 尝试次数达到 `max_attempts` 后进入死信。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: i32,
    /// 最小退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300), // 5分钟
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: i32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// 计算第 `attempts` 次失败后的退避时间
    pub fn calculate_backoff(&self, attempts: i32) -> Duration {
        let exponent = attempts.clamp(0, 32) as u32;
        let backoff = Duration::from_secs(2u64.saturating_pow(exponent));
        backoff.max(self.initial_backoff).min(self.max_backoff)
    }

    /// 计算下次可认领时间
    pub fn next_retry_time(&self, attempts: i32, base_time: DateTime<Utc>) -> DateTime<Utc> {
        let backoff = self.calculate_backoff(attempts);
        base_time + chrono::Duration::milliseconds(backoff.as_millis() as i64)
    }

    /// 是否应该重试
    pub fn should_retry(&self, attempts: i32) -> bool {
        attempts < self.max_attempts
    }

    /// 为一个推送失败的事件做出重试或死信决定
    pub fn decide(&self, event: &ClaimedEvent, now: DateTime<Utc>) -> RetryDecision {
        if self.should_retry(event.attempts) {
            RetryDecision::Retry {
                id: event.id,
                attempts: event.attempts,
                next_attempt_at: self.next_retry_time(event.attempts, now),
            }
        } else {
            RetryDecision::Dead {
                id: event.id,
                attempts: event.attempts,
            }
        }
    }
}
