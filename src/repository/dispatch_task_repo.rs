// ==========================================
// 物流托盘预约系统 - 预约下游调度记录仓储
// ==========================================
// 红线: 删除只允许在级联删除预约的事务内进行
// ==========================================

use crate::domain::appointment::DispatchTask;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_ts, parse_ts};
use rusqlite::{params, Connection, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// DispatchTaskRepository - 调度记录仓储
// ==========================================
pub struct DispatchTaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DispatchTaskRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记调度记录（由月台调度流程调用）
    pub fn insert(&self, task: &DispatchTask) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO appointment_dispatch_task (
                task_id, appointment_id, task_type, payload_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                task.task_id,
                task.appointment_id,
                task.task_type,
                task.payload_json.as_ref().map(|v| v.to_string()),
                fmt_ts(&task.created_at),
            ],
        )?;

        Ok(())
    }

    /// 查询预约下的调度记录
    pub fn find_by_appointment(&self, appointment_id: &str) -> RepositoryResult<Vec<DispatchTask>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT task_id, appointment_id, task_type, payload_json, created_at
            FROM appointment_dispatch_task
            WHERE appointment_id = ?1
            ORDER BY created_at, task_id
            "#,
        )?;

        let tasks = stmt
            .query_map(params![appointment_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(tasks)
    }

    /// 事务内删除预约下的全部调度记录
    pub fn delete_by_appointment_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM appointment_dispatch_task WHERE appointment_id = ?1",
            params![appointment_id],
        )?;
        Ok(affected)
    }

    fn map_row(row: &Row) -> SqliteResult<DispatchTask> {
        let payload_json: Option<String> = row.get(3)?;

        Ok(DispatchTask {
            task_id: row.get(0)?,
            appointment_id: row.get(1)?,
            task_type: row.get(2)?,
            payload_json: payload_json.and_then(|s| serde_json::from_str(&s).ok()),
            created_at: parse_ts(4, &row.get::<_, String>(4)?)?,
        })
    }
}
