// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::location_check::{
    CheckCommand, CheckCompleted, NearbyIncident, LOCATION_CHECK_EVENT,
};
use crate::domain::models::outbox::NewOutboxEvent;
use crate::domain::repositories::location_check_repository::{
    CheckRecorder, NearbyIncidentFinder,
};
use crate::domain::repositories::outbox_repository::{OutboxEnqueuer, RepositoryError};
use crate::infrastructure::database::unit_of_work::{Scope, UnitOfWork};
use crate::infrastructure::repositories::location_check_repo_impl::LocationCheckRepository;
use crate::infrastructure::repositories::outbox_repo_impl::OutboxRepository;
use chrono::Utc;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{debug, info};
use validator::{Validate, ValidationErrors};

/// 未指定数量时返回的附近事件数
pub const DEFAULT_CHECK_LIMIT: u32 = 50;

/// 位置检查错误
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<DbErr> for CheckError {
    fn from(e: DbErr) -> Self {
        CheckError::Repository(e.into())
    }
}

/// 位置检查结果
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub check_id: i64,
    pub incidents: Vec<NearbyIncident>,
    pub count: usize,
    /// 有命中时写入的发件箱事件ID
    pub outbox_id: Option<i64>,
}

/// 位置检查服务
///
/// 检查记录与完成事件在同一事务中写入：要么都可见，要么都不可见。
pub struct LocationCheckService<F: NearbyIncidentFinder> {
    uow: UnitOfWork,
    finder: F,
}

impl<F: NearbyIncidentFinder> LocationCheckService<F> {
    pub fn new(uow: UnitOfWork, finder: F) -> Self {
        Self { uow, finder }
    }

    /// 在新事务中执行位置检查
    pub async fn check_and_record(&self, command: CheckCommand) -> Result<CheckResult, CheckError> {
        self.check_and_record_in(Scope::Root, command).await
    }

    /// 在给定作用域中执行位置检查
    ///
    /// 作用域为外层事务时，记录与事件随外层一起提交或回滚。
    pub async fn check_and_record_in(
        &self,
        scope: Scope<'_>,
        command: CheckCommand,
    ) -> Result<CheckResult, CheckError> {
        command.validate()?;

        let limit = match command.limit {
            0 => DEFAULT_CHECK_LIMIT,
            limit => limit,
        };
        let incidents = self.finder.find_nearby(command.point, limit).await?;
        let incident_ids: Vec<i64> = incidents.iter().map(|i| i.incident_id).collect();
        debug!(
            user_id = %command.user_id,
            matched = incident_ids.len(),
            "Nearby incidents resolved"
        );

        let CheckCommand { user_id, point, .. } = command;
        let (check_id, outbox_id) = self
            .uow
            .within_tx(scope, move |txn| {
                Box::pin(async move {
                    let check_id = LocationCheckRepository::new(txn)
                        .record_check(&user_id, point, &incident_ids)
                        .await?;

                    if incident_ids.is_empty() {
                        return Ok::<_, CheckError>((check_id, None));
                    }

                    let occurred_at = Utc::now();
                    let event = CheckCompleted {
                        check_id,
                        user_id,
                        point,
                        incident_ids,
                        occurred_at,
                    };
                    let new_event =
                        NewOutboxEvent::from_payload(LOCATION_CHECK_EVENT, &event, occurred_at)
                            .map_err(RepositoryError::from)?;
                    let outbox_id = OutboxRepository::new(txn).enqueue(new_event).await?;
                    Ok((check_id, Some(outbox_id)))
                })
            })
            .await?;

        if let Some(outbox_id) = outbox_id {
            info!(check_id, outbox_id, "Location check recorded with event");
        }

        let count = incidents.len();
        Ok(CheckResult {
            check_id,
            incidents,
            count,
            outbox_id,
        })
    }
}

#[cfg(test)]
#[path = "check_and_record_test.rs"]
mod tests;
