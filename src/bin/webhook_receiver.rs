// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::anyhow;
use geonotify::config::settings::Settings;
use geonotify::presentation::routes::receiver_routes;
use geonotify::utils::telemetry;
use geonotify::workers::manager::shutdown_signal;
use tokio::net::TcpListener;
use tracing::info;
use url::Url;

/// 本地调试用的 Webhook 接收端
///
/// 监听 `webhook.target_url` 指向的地址，打印收到的请求并返回 200
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::new()?;
    telemetry::init_telemetry(&settings.logging)?;

    let target = Url::parse(&settings.webhook.target_url)?;
    let host = target
        .host_str()
        .ok_or_else(|| anyhow!("webhook.target_url has no host"))?;
    let port = target
        .port_or_known_default()
        .ok_or_else(|| anyhow!("webhook.target_url has no port"))?;

    let listener = TcpListener::bind((host, port)).await?;
    info!(
        addr = %listener.local_addr()?,
        path = target.path(),
        "Webhook receiver listening"
    );

    axum::serve(listener, receiver_routes(target.path()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Webhook receiver stopped");
    Ok(())
}
