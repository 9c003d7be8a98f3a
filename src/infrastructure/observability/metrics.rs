// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use metrics::{describe_counter, describe_histogram, Unit};

pub const RELAY_CLAIMED: &str = "outbox_relay_claimed_total";
pub const RELAY_DISPATCHED: &str = "outbox_relay_dispatched_total";
pub const RELAY_RETRIED: &str = "outbox_relay_retried_total";
pub const RELAY_DEAD: &str = "outbox_relay_dead_total";

pub const DELIVERY_ATTEMPTS: &str = "webhook_delivery_attempts_total";
pub const DELIVERY_SUCCESS: &str = "webhook_delivery_success_total";
pub const DELIVERY_FAILED: &str = "webhook_delivery_failed_total";
pub const DELIVERY_DURATION: &str = "webhook_delivery_duration_seconds";
pub const DUPLICATE_SKIPPED: &str = "webhook_duplicate_skipped_total";
pub const POISON_MESSAGES: &str = "webhook_poison_messages_total";

/// 注册指标描述
///
/// 只登记描述，记录器由宿主进程安装；未安装时所有记录都是空操作。
pub fn describe_metrics() {
    describe_counter!(RELAY_CLAIMED, "Outbox events claimed by the relay");
    describe_counter!(
        RELAY_DISPATCHED,
        "Outbox events pushed to the stream and marked dispatched"
    );
    describe_counter!(RELAY_RETRIED, "Outbox events returned to pending after a failed push");
    describe_counter!(RELAY_DEAD, "Outbox events moved to the dead state");

    describe_counter!(DELIVERY_ATTEMPTS, "Webhook POST attempts");
    describe_counter!(DELIVERY_SUCCESS, "Webhook deliveries acknowledged with 2xx");
    describe_counter!(DELIVERY_FAILED, "Webhook deliveries that failed, by reason");
    describe_histogram!(
        DELIVERY_DURATION,
        Unit::Seconds,
        "Duration of webhook POST requests"
    );
    describe_counter!(
        DUPLICATE_SKIPPED,
        "Stream messages acknowledged without a POST because they were already delivered"
    );
    describe_counter!(POISON_MESSAGES, "Undecodable stream messages dropped");
}
