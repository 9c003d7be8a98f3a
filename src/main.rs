// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use geonotify::config::settings::Settings;
use geonotify::infrastructure::cache::redis_client::RedisClient;
use geonotify::infrastructure::database::connection;
use geonotify::infrastructure::database::unit_of_work::UnitOfWork;
use geonotify::infrastructure::observability::metrics::describe_metrics;
use geonotify::infrastructure::repositories::outbox_repo_impl::SqlOutboxStore;
use geonotify::infrastructure::services::webhook_service_impl::HttpWebhookService;
use geonotify::queue::redis_stream::RedisEventStream;
use geonotify::utils::telemetry;
use geonotify::workers::manager::WorkerManager;
use geonotify::workers::outbox_relay::OutboxRelay;
use geonotify::workers::webhook_worker::{WebhookWorker, WebhookWorkerConfig};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// 主函数
///
/// 启动发件箱中继和 Webhook 分发工作器，直到收到关闭信号
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let settings = Settings::new()?;

    // 2. Initialize logging
    telemetry::init_telemetry(&settings.logging)?;
    info!("Starting geonotify...");
    describe_metrics();

    // 3. Connect to database
    let db = connection::create_pool(&settings.database).await?;
    let db = Arc::new(db);
    info!("Database connection established");

    // Run database migrations
    info!("Running database migrations...");
    Migrator::up(db.as_ref(), None).await?;
    info!("Database migrations applied");

    // 4. Outbox relay
    let webhook = &settings.webhook;
    let mut worker_manager =
        WorkerManager::new(webhook.request_timeout() + Duration::from_secs(5));

    let store = SqlOutboxStore::new(UnitOfWork::new(db.clone()));
    let producer =
        RedisEventStream::connect(&settings.redis.url, &webhook.stream, &webhook.consumer_group)
            .await?;
    info!(stream = producer.stream(), "Outbox relay publishing");
    worker_manager.spawn(OutboxRelay::new(store, producer, &settings.outbox));

    // 5. Webhook dispatch workers, one stream connection each
    let dedupe = Arc::new(RedisClient::new(&settings.redis.url)?);
    let sender = Arc::new(HttpWebhookService::new(
        webhook.target_url.clone(),
        webhook.request_timeout(),
        webhook.signing_secret.clone(),
    )?);
    for index in 0..webhook.workers {
        let consumer =
            RedisEventStream::connect(&settings.redis.url, &webhook.stream, &webhook.consumer_group)
                .await?;
        worker_manager.spawn(WebhookWorker::new(
            consumer,
            dedupe.clone(),
            sender.clone(),
            WebhookWorkerConfig::from_settings(webhook, index),
        ));
    }
    info!(
        workers = worker_manager.len(),
        target_url = %webhook.target_url,
        "Workers started"
    );

    worker_manager.wait_for_shutdown().await;
    Ok(())
}
