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

use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::warn;

/// 事务闭包返回的 future
pub type TxFuture<'c, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'c>>;

/// 调用方所处的事务作用域
#[derive(Clone, Copy)]
pub enum Scope<'a> {
    /// 不在事务中
    Root,
    /// 已在事务中，内层操作直接加入
    Tx(&'a DatabaseTransaction),
}

/// 工作单元
///
/// 让多个仓库写入共享同一个事务。在根作用域调用时开启新事务，
/// 闭包成功则提交，失败则回滚；在事务作用域调用时直接复用外层事务，
/// 提交与回滚由外层决定。
#[derive(Clone)]
pub struct UnitOfWork {
    db: Arc<DatabaseConnection>,
}

impl UnitOfWork {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// 在事务中执行闭包
    ///
    /// 闭包拿到的事务句柄不能逃逸出闭包，需要的数据应以所有权方式移入。
    pub async fn within_tx<T, E, F>(&self, scope: Scope<'_>, f: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> TxFuture<'c, T, E> + Send,
        T: Send,
        E: From<DbErr> + Send,
    {
        match scope {
            Scope::Tx(txn) => f(txn).await,
            Scope::Root => {
                let txn = self.db.begin().await?;
                match f(&txn).await {
                    Ok(value) => {
                        txn.commit().await?;
                        Ok(value)
                    }
                    Err(e) => {
                        if let Err(rollback_err) = txn.rollback().await {
                            warn!(error = %rollback_err, "Transaction rollback failed");
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "unit_of_work_test.rs"]
mod tests;
