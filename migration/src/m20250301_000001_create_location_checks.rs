// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DbBackend;

/// 位置检查记录表迁移
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite only accepts AUTOINCREMENT on an INTEGER primary key
        let mut id = ColumnDef::new(LocationChecks::Id);
        if manager.get_database_backend() == DbBackend::Sqlite {
            id.integer();
        } else {
            id.big_integer();
        }
        id.not_null().auto_increment().primary_key();

        manager
            .create_table(
                Table::create()
                    .table(LocationChecks::Table)
                    .if_not_exists()
                    .col(&mut id)
                    .col(ColumnDef::new(LocationChecks::UserId).string().not_null())
                    .col(ColumnDef::new(LocationChecks::Lat).double().not_null())
                    .col(ColumnDef::new(LocationChecks::Lon).double().not_null())
                    .col(
                        ColumnDef::new(LocationChecks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LocationCheckIncidents::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LocationCheckIncidents::CheckId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(LocationCheckIncidents::IncidentId)
                            .big_integer()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(LocationCheckIncidents::CheckId)
                            .col(LocationCheckIncidents::IncidentId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_location_check_incidents_check")
                            .from(LocationCheckIncidents::Table, LocationCheckIncidents::CheckId)
                            .to(LocationChecks::Table, LocationChecks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_location_checks_user_id")
                    .table(LocationChecks::Table)
                    .col(LocationChecks::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LocationCheckIncidents::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(LocationChecks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum LocationChecks {
    Table,
    Id,
    UserId,
    Lat,
    Lon,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LocationCheckIncidents {
    Table,
    CheckId,
    IncidentId,
}
