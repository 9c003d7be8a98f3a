// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::outbox::{
    ClaimedEvent, NewOutboxEvent, OutboxEvent, OutboxStatus, Reconciliation, RetryDecision,
};
use crate::domain::repositories::outbox_repository::{
    BatchClaimer, OutboxEnqueuer, RepositoryError,
};
use crate::infrastructure::database::entities::outbox_event;
use crate::infrastructure::database::unit_of_work::{Scope, UnitOfWork};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::time::Duration;
use tracing::{debug, warn};

type DbTime = sea_orm::prelude::DateTimeWithTimeZone;

fn to_db_time(time: DateTime<Utc>) -> DbTime {
    time.into()
}

fn to_chrono(duration: Duration) -> Result<chrono::Duration, RepositoryError> {
    chrono::Duration::from_std(duration)
        .map_err(|e| RepositoryError::InvalidArgument(format!("duration {:?}: {}", duration, e)))
}

impl TryFrom<outbox_event::Model> for OutboxEvent {
    type Error = RepositoryError;

    fn try_from(model: outbox_event::Model) -> Result<Self, Self::Error> {
        let status = model
            .status
            .parse::<OutboxStatus>()
            .map_err(|reason| RepositoryError::Corrupted {
                id: model.id,
                reason,
            })?;
        Ok(Self {
            id: model.id,
            event_type: model.event_type,
            payload: model.payload,
            status,
            attempts: model.attempts,
            next_attempt_at: model.next_attempt_at.with_timezone(&Utc),
            processing_until: model.processing_until.map(|t| t.with_timezone(&Utc)),
            last_error: model.last_error,
            created_at: model.created_at.with_timezone(&Utc),
            updated_at: model.updated_at.with_timezone(&Utc),
        })
    }
}

/// 发件箱仓库
///
/// 绑定在调用方提供的连接上，通常是一个事务。
/// 所有对处理中事件的回写都以认领时的尝试次数作为栅栏，
/// 租约已被其他中继接管的行不会被覆盖。
pub struct OutboxRepository<'c, C: ConnectionTrait> {
    conn: &'c C,
}

impl<'c, C: ConnectionTrait> OutboxRepository<'c, C> {
    pub fn new(conn: &'c C) -> Self {
        Self { conn }
    }

    /// 写入一条待认领事件
    pub async fn insert(&self, event: NewOutboxEvent) -> Result<i64, RepositoryError> {
        let now = to_db_time(Utc::now());
        let model = outbox_event::ActiveModel {
            event_type: Set(event.event_type),
            payload: Set(event.payload),
            status: Set(OutboxStatus::Pending.as_str().to_string()),
            attempts: Set(0),
            next_attempt_at: Set(to_db_time(event.not_before)),
            processing_until: Set(None),
            last_error: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let result = outbox_event::Entity::insert(model).exec(self.conn).await?;
        Ok(result.last_insert_id)
    }

    /// 认领最多 `limit` 条可处理事件
    ///
    /// 必须在事务中调用：行锁在提交前一直持有，被其他事务锁住的行直接跳过。
    pub async fn claim(
        &self,
        limit: u64,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClaimedEvent>, RepositoryError> {
        let lease_until = to_db_time(now + to_chrono(lease)?);
        let now = to_db_time(now);

        let rows = outbox_event::Entity::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(outbox_event::Column::Status.eq(OutboxStatus::Pending.as_str()))
                            .add(outbox_event::Column::NextAttemptAt.lte(now)),
                    )
                    .add(
                        Condition::all()
                            .add(
                                outbox_event::Column::Status
                                    .eq(OutboxStatus::Processing.as_str()),
                            )
                            .add(outbox_event::Column::ProcessingUntil.lte(now)),
                    ),
            )
            .order_by_asc(outbox_event::Column::Id)
            .limit(limit)
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(self.conn)
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Processing.as_str()),
            )
            .col_expr(
                outbox_event::Column::Attempts,
                Expr::col(outbox_event::Column::Attempts).add(1),
            )
            .col_expr(
                outbox_event::Column::ProcessingUntil,
                Expr::value(Some(lease_until)),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(now))
            .filter(outbox_event::Column::Id.is_in(ids))
            .exec(self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ClaimedEvent {
                id: row.id,
                event_type: row.event_type,
                payload: row.payload,
                attempts: row.attempts + 1,
            })
            .collect())
    }

    /// 将整批事件标记为已分发，返回实际更新的行数
    pub async fn mark_dispatched(
        &self,
        events: &[ClaimedEvent],
        now: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        if events.is_empty() {
            return Ok(0);
        }

        let fence = events.iter().fold(Condition::any(), |cond, event| {
            cond.add(
                Condition::all()
                    .add(outbox_event::Column::Id.eq(event.id))
                    .add(outbox_event::Column::Attempts.eq(event.attempts)),
            )
        });

        let result = outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Dispatched.as_str()),
            )
            .col_expr(
                outbox_event::Column::ProcessingUntil,
                Expr::value(Option::<DbTime>::None),
            )
            .col_expr(
                outbox_event::Column::LastError,
                Expr::value(Option::<String>::None),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(to_db_time(now)))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing.as_str()))
            .filter(fence)
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// 放回待认领队列，`next_attempt_at` 之前不会再被认领
    pub async fn mark_retry(
        &self,
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Pending.as_str()),
            )
            .col_expr(
                outbox_event::Column::NextAttemptAt,
                Expr::value(to_db_time(next_attempt_at)),
            )
            .col_expr(
                outbox_event::Column::ProcessingUntil,
                Expr::value(Option::<DbTime>::None),
            )
            .col_expr(
                outbox_event::Column::LastError,
                Expr::value(Some(last_error.to_string())),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(to_db_time(now)))
            .filter(outbox_event::Column::Id.eq(id))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing.as_str()))
            .filter(outbox_event::Column::Attempts.eq(attempts))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// 标记为死信，之后不会再被认领
    pub async fn mark_dead(
        &self,
        id: i64,
        attempts: i32,
        last_error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = outbox_event::Entity::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Dead.as_str()),
            )
            .col_expr(
                outbox_event::Column::ProcessingUntil,
                Expr::value(Option::<DbTime>::None),
            )
            .col_expr(
                outbox_event::Column::LastError,
                Expr::value(Some(last_error.to_string())),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(to_db_time(now)))
            .filter(outbox_event::Column::Id.eq(id))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing.as_str()))
            .filter(outbox_event::Column::Attempts.eq(attempts))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<OutboxEvent>, RepositoryError> {
        outbox_event::Entity::find_by_id(id)
            .one(self.conn)
            .await?
            .map(OutboxEvent::try_from)
            .transpose()
    }

    pub async fn count_by_status(&self, status: OutboxStatus) -> Result<u64, RepositoryError> {
        let count = outbox_event::Entity::find()
            .filter(outbox_event::Column::Status.eq(status.as_str()))
            .count(self.conn)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl<'c, C> OutboxEnqueuer for OutboxRepository<'c, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn enqueue(&self, event: NewOutboxEvent) -> Result<i64, RepositoryError> {
        self.insert(event).await
    }
}

/// 面向中继的发件箱存储
///
/// 每次调用在根作用域开启自己的事务。
#[derive(Clone)]
pub struct SqlOutboxStore {
    uow: UnitOfWork,
}

impl SqlOutboxStore {
    pub fn new(uow: UnitOfWork) -> Self {
        Self { uow }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<OutboxEvent>, RepositoryError> {
        OutboxRepository::new(self.uow.connection())
            .find_by_id(id)
            .await
    }

    pub async fn count_by_status(&self, status: OutboxStatus) -> Result<u64, RepositoryError> {
        OutboxRepository::new(self.uow.connection())
            .count_by_status(status)
            .await
    }
}

#[async_trait]
impl OutboxEnqueuer for SqlOutboxStore {
    async fn enqueue(&self, event: NewOutboxEvent) -> Result<i64, RepositoryError> {
        self.uow
            .within_tx(Scope::Root, move |txn| {
                Box::pin(async move { OutboxRepository::new(txn).insert(event).await })
            })
            .await
    }
}

#[async_trait]
impl BatchClaimer for SqlOutboxStore {
    async fn claim_batch(
        &self,
        limit: u64,
        lease: Duration,
    ) -> Result<Vec<ClaimedEvent>, RepositoryError> {
        self.uow
            .within_tx(Scope::Root, move |txn| {
                Box::pin(async move {
                    OutboxRepository::new(txn)
                        .claim(limit, lease, Utc::now())
                        .await
                })
            })
            .await
    }

    async fn reconcile(&self, outcome: Reconciliation) -> Result<(), RepositoryError> {
        self.uow
            .within_tx(Scope::Root, move |txn| {
                Box::pin(async move {
                    let repo = OutboxRepository::new(txn);
                    let now = Utc::now();
                    match outcome {
                        Reconciliation::Dispatched(events) => {
                            let updated = repo.mark_dispatched(&events, now).await?;
                            if updated < events.len() as u64 {
                                warn!(
                                    expected = events.len(),
                                    updated, "Some dispatched events lost their lease"
                                );
                            }
                        }
                        Reconciliation::Failed {
                            decisions,
                            last_error,
                        } => {
                            for decision in decisions {
                                let applied = match &decision {
                                    RetryDecision::Retry {
                                        id,
                                        attempts,
                                        next_attempt_at,
                                    } => {
                                        repo.mark_retry(
                                            *id,
                                            *attempts,
                                            *next_attempt_at,
                                            &last_error,
                                            now,
                                        )
                                        .await?
                                    }
                                    RetryDecision::Dead { id, attempts } => {
                                        repo.mark_dead(*id, *attempts, &last_error, now).await?
                                    }
                                };
                                if !applied {
                                    let finished = repo
                                        .find_by_id(decision.id())
                                        .await?
                                        .map(|event| event.status.is_terminal())
                                        .unwrap_or(false);
                                    if finished {
                                        warn!(
                                            id = decision.id(),
                                            "Event already finished by another relay"
                                        );
                                    } else {
                                        debug!(id = decision.id(), "Skipped update for reclaimed event");
                                    }
                                }
                            }
                        }
                    }
                    Ok(())
                })
            })
            .await
    }
}

#[cfg(test)]
#[path = "outbox_repo_impl_test.rs"]
mod tests;
