// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::LoggingSettings;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "info,geonotify=debug";

/// 初始化日志
///
/// `RUST_LOG` 优先，其次使用默认过滤规则；`format` 为 `json` 时输出结构化日志。
pub fn init_telemetry(settings: &LoggingSettings) -> Result<(), TryInitError> {
    let json = settings.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .try_init()
}
