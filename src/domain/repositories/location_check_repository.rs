// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::outbox_repository::RepositoryError;
use crate::domain::models::location_check::{NearbyIncident, Point};
use async_trait::async_trait;
use std::sync::Arc;

/// 位置检查记录接口
#[async_trait]
pub trait CheckRecorder: Send + Sync {
    /// 记录一次检查及其命中的事件，返回检查ID
    async fn record_check(
        &self,
        user_id: &str,
        point: Point,
        incident_ids: &[i64],
    ) -> Result<i64, RepositoryError>;
}

/// 附近事件查询
///
/// 地理空间查询由外部协作方提供。
#[async_trait]
pub trait NearbyIncidentFinder: Send + Sync {
    async fn find_nearby(
        &self,
        point: Point,
        limit: u32,
    ) -> Result<Vec<NearbyIncident>, RepositoryError>;
}

#[async_trait]
impl<T: NearbyIncidentFinder + ?Sized> NearbyIncidentFinder for Arc<T> {
    async fn find_nearby(
        &self,
        point: Point,
        limit: u32,
    ) -> Result<Vec<NearbyIncident>, RepositoryError> {
        (**self).find_nearby(point, limit).await
    }
}
