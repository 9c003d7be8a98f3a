// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

/// Webhook 发件箱表迁移
///
/// 发件箱记录与业务写入在同一事务中提交，由中继进程认领后推送到消息流。
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();

        let mut id = ColumnDef::new(WebhookOutbox::Id);
        let mut payload = ColumnDef::new(WebhookOutbox::Payload);
        if backend == DbBackend::Sqlite {
            id.integer();
            payload.json();
        } else {
            id.big_integer();
            payload.json_binary();
        }
        id.not_null().auto_increment().primary_key();
        payload.not_null();

        manager
            .create_table(
                Table::create()
                    .table(WebhookOutbox::Table)
                    .if_not_exists()
                    .col(&mut id)
                    .col(ColumnDef::new(WebhookOutbox::EventType).string().not_null())
                    .col(&mut payload)
                    .col(
                        ColumnDef::new(WebhookOutbox::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(WebhookOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(WebhookOutbox::NextAttemptAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookOutbox::ProcessingUntil).timestamp_with_time_zone())
                    .col(ColumnDef::new(WebhookOutbox::LastError).text())
                    .col(
                        ColumnDef::new(WebhookOutbox::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookOutbox::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Claim query scans both branches of its OR
        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_outbox_status_next_attempt")
                    .table(WebhookOutbox::Table)
                    .col(WebhookOutbox::Status)
                    .col(WebhookOutbox::NextAttemptAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_webhook_outbox_status_processing_until")
                    .table(WebhookOutbox::Table)
                    .col(WebhookOutbox::Status)
                    .col(WebhookOutbox::ProcessingUntil)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookOutbox::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WebhookOutbox {
    Table,
    Id,
    EventType,
    Payload,
    Status,
    Attempts,
    NextAttemptAt,
    ProcessingUntil,
    LastError,
    CreatedAt,
    UpdatedAt,
}
