// ==========================================
// 物流托盘预约系统 - 预约数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: total_units 只允许预约引擎通过 *_tx 接口写入
// ==========================================

use crate::domain::appointment::Appointment;
use crate::domain::types::AppointmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT appointment_id, reference_code, status, scheduled_at, total_units,
           created_at, updated_at, updated_by
    FROM appointment
"#;

// ==========================================
// AppointmentRepository - 预约仓储
// ==========================================
pub struct AppointmentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AppointmentRepository {
    /// 创建新的预约仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 新建预约（由预约管理模块调用）
    pub fn insert(&self, appointment: &Appointment) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO appointment (
                appointment_id, reference_code, status, scheduled_at, total_units,
                created_at, updated_at, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                appointment.appointment_id,
                appointment.reference_code,
                appointment.status.to_db_str(),
                appointment.scheduled_at.as_ref().map(fmt_ts),
                appointment.total_units,
                fmt_ts(&appointment.created_at),
                fmt_ts(&appointment.updated_at),
                appointment.updated_by,
            ],
        )?;

        Ok(appointment.appointment_id.clone())
    }

    /// 按ID查询预约
    pub fn find_by_id(&self, appointment_id: &str) -> RepositoryResult<Option<Appointment>> {
        let conn = self.get_conn()?;
        Self::find_on(&conn, appointment_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 事务内按ID查询
    pub fn find_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<Option<Appointment>> {
        Self::find_on(tx, appointment_id)
    }

    /// 事务内按ID查询，不存在则报 NotFound
    pub fn require_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<Appointment> {
        Self::find_on(tx, appointment_id)?
            .ok_or_else(|| RepositoryError::not_found("Appointment", appointment_id))
    }

    /// 事务内按增量调整 total_units
    pub fn add_total_units_tx(
        tx: &Transaction,
        appointment_id: &str,
        delta: i64,
        actor: &str,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE appointment
            SET total_units = total_units + ?2, updated_at = ?3, updated_by = ?4
            WHERE appointment_id = ?1
            "#,
            params![appointment_id, delta, fmt_ts(&super::now_ts()), actor],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("Appointment", appointment_id));
        }
        Ok(())
    }

    /// 事务内直接写入 total_units（对账修复用）
    pub fn set_total_units_tx(
        tx: &Transaction,
        appointment_id: &str,
        total_units: i64,
        actor: &str,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE appointment
            SET total_units = ?2, updated_at = ?3, updated_by = ?4
            WHERE appointment_id = ?1
            "#,
            params![appointment_id, total_units, fmt_ts(&super::now_ts()), actor],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("Appointment", appointment_id));
        }
        Ok(())
    }

    /// 事务内删除预约行
    pub fn delete_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM appointment WHERE appointment_id = ?1",
            params![appointment_id],
        )?;
        Ok(affected)
    }

    /// 事务内列出所有预约（对账用）
    pub fn list_all_tx(tx: &Transaction) -> RepositoryResult<Vec<Appointment>> {
        let mut stmt = tx.prepare(&format!("{} ORDER BY appointment_id", SELECT_COLUMNS))?;
        let appointments = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(appointments)
    }

    fn find_on(conn: &Connection, appointment_id: &str) -> RepositoryResult<Option<Appointment>> {
        let appointment = conn
            .query_row(
                &format!("{} WHERE appointment_id = ?1", SELECT_COLUMNS),
                params![appointment_id],
                Self::map_row,
            )
            .optional()?;
        Ok(appointment)
    }

    /// 映射数据库行到Appointment对象
    fn map_row(row: &Row) -> SqliteResult<Appointment> {
        let scheduled_at = match row.get::<_, Option<String>>(3)? {
            Some(raw) => Some(parse_ts(3, &raw)?),
            None => None,
        };

        Ok(Appointment {
            appointment_id: row.get(0)?,
            reference_code: row.get(1)?,
            status: AppointmentStatus::from_db_str(&row.get::<_, String>(2)?),
            scheduled_at,
            total_units: row.get(4)?,
            created_at: parse_ts(5, &row.get::<_, String>(5)?)?,
            updated_at: parse_ts(6, &row.get::<_, String>(6)?)?,
            updated_by: row.get(7)?,
        })
    }
}
