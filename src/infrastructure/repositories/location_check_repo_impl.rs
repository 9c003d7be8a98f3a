// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::location_check::Point;
use crate::domain::repositories::location_check_repository::CheckRecorder;
use crate::domain::repositories::outbox_repository::RepositoryError;
use crate::infrastructure::database::entities::{location_check, location_check_incident};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};
use std::collections::BTreeSet;

/// 位置检查仓库
///
/// 与发件箱仓库一样绑定在调用方的连接上，以便和事件写入共享事务。
pub struct LocationCheckRepository<'c, C: ConnectionTrait> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> LocationCheckRepository<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<'c, C> CheckRecorder for LocationCheckRepository<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn record_check(
        &self,
        user_id: &str,
        point: Point,
        incident_ids: &[i64],
    ) -> Result<i64, RepositoryError> {
        let check = location_check::ActiveModel {
            user_id: Set(user_id.to_string()),
            lat: Set(point.lat),
            lon: Set(point.lon),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;

        let unique: BTreeSet<i64> = incident_ids.iter().copied().collect();
        if !unique.is_empty() {
            let links = unique
                .into_iter()
                .map(|incident_id| location_check_incident::ActiveModel {
                    check_id: Set(check.id),
                    incident_id: Set(incident_id),
                });
            location_check_incident::Entity::insert_many(links)
                .exec_without_returning(self.conn)
                .await?;
        }

        Ok(check.id)
    }
}
