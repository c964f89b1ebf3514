// ==========================================
// 物流托盘预约系统 - 事务协调器
// ==========================================
// 红线: 每个变更操作恰好一个事务
// 红线: 事务以 IMMEDIATE 开启，先拿写锁再读容量，
//       读-改-写之间不会插入其他写者
// 只读查询走 DEFERRED 快照，不参与写锁排队
// ==========================================

use crate::repository::error::RepositoryError;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

// ==========================================
// TransactionCoordinator - 事务协调器
// ==========================================
#[derive(Clone)]
pub struct TransactionCoordinator {
    conn: Arc<Mutex<Connection>>,
}

impl TransactionCoordinator {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 在写事务内执行 `op`
    ///
    /// - `op` 返回 Ok：提交
    /// - `op` 返回 Err：回滚，原样返回错误
    ///
    /// 其他连接持有写锁时最多等待 busy_timeout，超时报事务失败
    pub fn run<T, E, F>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.run_with(label, TransactionBehavior::Immediate, op)
    }

    /// 在只读快照内执行 `op`（DEFERRED，不抢写锁）
    ///
    /// 只允许读；快照在首次读取时建立，事务结束前不受其他写者影响
    pub fn read<T, E, F>(&self, label: &str, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        self.run_with(label, TransactionBehavior::Deferred, op)
    }

    fn run_with<T, E, F>(&self, label: &str, behavior: TransactionBehavior, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;

        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(RepositoryError::from)?;

        match op(&tx) {
            Ok(value) => {
                tx.commit().map_err(RepositoryError::from)?;
                debug!(op = label, "事务已提交");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(op = label, error = %rollback_err, "事务回滚失败（连接关闭时由 SQLite 回滚）");
                }
                debug!(op = label, "事务已回滚");
                Err(err)
            }
        }
    }
}
