// ==========================================
// 物流托盘预约系统 - 预约明细（账本）数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 红线: 写接口只允许 BookingLedger / CascadeService 在事务内调用
// ==========================================

use crate::domain::appointment::ReservationLine;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_ts, now_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT reservation_id, appointment_id, shipment_line_id,
           reserved_units, rejected_units, capacity_snapshot,
           created_at, created_by, updated_at, updated_by
    FROM reservation_line
"#;

// ==========================================
// ReservationLineRepository - 预约明细仓储
// ==========================================
pub struct ReservationLineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationLineRepository {
    /// 创建新的预约明细仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 按ID查询预约明细
    pub fn find_by_id(&self, reservation_id: &str) -> RepositoryResult<Option<ReservationLine>> {
        let conn = self.get_conn()?;
        Self::find_on(&conn, reservation_id)
    }

    /// 查询预约下的所有明细
    pub fn find_by_appointment(&self, appointment_id: &str) -> RepositoryResult<Vec<ReservationLine>> {
        let conn = self.get_conn()?;
        Self::query_on(&conn, "appointment_id", appointment_id)
    }

    /// 查询订单明细上的所有预约
    pub fn find_by_shipment_line(&self, shipment_line_id: &str) -> RepositoryResult<Vec<ReservationLine>> {
        let conn = self.get_conn()?;
        Self::query_on(&conn, "shipment_line_id", shipment_line_id)
    }

    // ==========================================
    // 事务内查询
    // ==========================================

    pub fn find_tx(tx: &Transaction, reservation_id: &str) -> RepositoryResult<Option<ReservationLine>> {
        Self::find_on(tx, reservation_id)
    }

    /// 按 (预约, 订单明细) 查询，唯一键
    pub fn find_by_pair_tx(
        tx: &Transaction,
        appointment_id: &str,
        shipment_line_id: &str,
    ) -> RepositoryResult<Option<ReservationLine>> {
        let line = tx
            .query_row(
                &format!(
                    "{} WHERE appointment_id = ?1 AND shipment_line_id = ?2",
                    SELECT_COLUMNS
                ),
                params![appointment_id, shipment_line_id],
                Self::map_row,
            )
            .optional()?;
        Ok(line)
    }

    pub fn find_by_appointment_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<Vec<ReservationLine>> {
        Self::query_on(tx, "appointment_id", appointment_id)
    }

    /// 订单明细上的净占用合计 Σ(reserved - rejected)
    ///
    /// # 参数
    /// - exclude_reservation_id: 排除的明细（修改时排除自身）
    pub fn sum_effective_tx(
        tx: &Transaction,
        shipment_line_id: &str,
        exclude_reservation_id: Option<&str>,
    ) -> RepositoryResult<i64> {
        let total: i64 = tx.query_row(
            r#"
            SELECT COALESCE(SUM(reserved_units - rejected_units), 0)
            FROM reservation_line
            WHERE shipment_line_id = ?1
              AND (?2 IS NULL OR reservation_id <> ?2)
            "#,
            params![shipment_line_id, exclude_reservation_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    /// 预约下的毛量合计 Σ reserved_units
    pub fn sum_reserved_by_appointment_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<i64> {
        let total: i64 = tx.query_row(
            "SELECT COALESCE(SUM(reserved_units), 0) FROM reservation_line WHERE appointment_id = ?1",
            params![appointment_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    // ==========================================
    // 事务内写入
    // ==========================================

    pub fn insert_tx(tx: &Transaction, line: &ReservationLine) -> RepositoryResult<()> {
        tx.execute(
            r#"
            INSERT INTO reservation_line (
                reservation_id, appointment_id, shipment_line_id,
                reserved_units, rejected_units, capacity_snapshot,
                created_at, created_by, updated_at, updated_by
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                line.reservation_id,
                line.appointment_id,
                line.shipment_line_id,
                line.reserved_units,
                line.rejected_units,
                line.capacity_snapshot,
                fmt_ts(&line.created_at),
                line.created_by,
                fmt_ts(&line.updated_at),
                line.updated_by,
            ],
        )?;
        Ok(())
    }

    /// 改写预约/拒收托数
    pub fn update_units_tx(
        tx: &Transaction,
        reservation_id: &str,
        reserved_units: i64,
        rejected_units: i64,
        actor: &str,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE reservation_line
            SET reserved_units = ?2, rejected_units = ?3, updated_at = ?4, updated_by = ?5
            WHERE reservation_id = ?1
            "#,
            params![reservation_id, reserved_units, rejected_units, fmt_ts(&now_ts()), actor],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ReservationLine", reservation_id));
        }
        Ok(())
    }

    /// 改挂到另一个预约
    pub fn reassign_appointment_tx(
        tx: &Transaction,
        reservation_id: &str,
        target_appointment_id: &str,
        actor: &str,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE reservation_line
            SET appointment_id = ?2, updated_at = ?3, updated_by = ?4
            WHERE reservation_id = ?1
            "#,
            params![reservation_id, target_appointment_id, fmt_ts(&now_ts()), actor],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ReservationLine", reservation_id));
        }
        Ok(())
    }

    pub fn delete_tx(tx: &Transaction, reservation_id: &str) -> RepositoryResult<()> {
        let affected = tx.execute(
            "DELETE FROM reservation_line WHERE reservation_id = ?1",
            params![reservation_id],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ReservationLine", reservation_id));
        }
        Ok(())
    }

    pub fn delete_by_appointment_tx(tx: &Transaction, appointment_id: &str) -> RepositoryResult<usize> {
        let affected = tx.execute(
            "DELETE FROM reservation_line WHERE appointment_id = ?1",
            params![appointment_id],
        )?;
        Ok(affected)
    }

    // ==========================================
    // 内部工具
    // ==========================================

    fn find_on(conn: &Connection, reservation_id: &str) -> RepositoryResult<Option<ReservationLine>> {
        let line = conn
            .query_row(
                &format!("{} WHERE reservation_id = ?1", SELECT_COLUMNS),
                params![reservation_id],
                Self::map_row,
            )
            .optional()?;
        Ok(line)
    }

    /// 按单列等值查询（列名只来自本模块常量，不拼接外部输入）
    fn query_on(conn: &Connection, column: &str, value: &str) -> RepositoryResult<Vec<ReservationLine>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE {} = ?1 ORDER BY created_at, reservation_id",
            SELECT_COLUMNS, column
        ))?;

        let lines = stmt
            .query_map(params![value], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    /// 映射数据库行到ReservationLine对象
    fn map_row(row: &Row) -> SqliteResult<ReservationLine> {
        Ok(ReservationLine {
            reservation_id: row.get(0)?,
            appointment_id: row.get(1)?,
            shipment_line_id: row.get(2)?,
            reserved_units: row.get(3)?,
            rejected_units: row.get(4)?,
            capacity_snapshot: row.get(5)?,
            created_at: parse_ts(6, &row.get::<_, String>(6)?)?,
            created_by: row.get(7)?,
            updated_at: parse_ts(8, &row.get::<_, String>(8)?)?,
            updated_by: row.get(9)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO shipment_line (shipment_line_id, order_id, declared_units, remaining_units)
                VALUES ('SL1', 'ORD1', 10, 10);
            INSERT INTO appointment (appointment_id, reference_code, created_at, updated_at)
                VALUES ('A1', 'APT-1', '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            INSERT INTO appointment (appointment_id, reference_code, created_at, updated_at)
                VALUES ('A2', 'APT-2', '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            "#,
        )
        .unwrap();
        conn
    }

    fn make_line(id: &str, appointment_id: &str, reserved: i64, rejected: i64) -> ReservationLine {
        let ts = now_ts();
        ReservationLine {
            reservation_id: id.to_string(),
            appointment_id: appointment_id.to_string(),
            shipment_line_id: "SL1".to_string(),
            reserved_units: reserved,
            rejected_units: rejected,
            capacity_snapshot: 10,
            created_at: ts,
            created_by: Some("tester".to_string()),
            updated_at: ts,
            updated_by: Some("tester".to_string()),
        }
    }

    #[test]
    fn test_sum_effective_excludes_self() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();

        ReservationLineRepository::insert_tx(&tx, &make_line("R1", "A1", 6, 2)).unwrap();
        ReservationLineRepository::insert_tx(&tx, &make_line("R2", "A2", 3, 0)).unwrap();

        assert_eq!(ReservationLineRepository::sum_effective_tx(&tx, "SL1", None).unwrap(), 7);
        assert_eq!(ReservationLineRepository::sum_effective_tx(&tx, "SL1", Some("R1")).unwrap(), 3);
        assert_eq!(ReservationLineRepository::sum_effective_tx(&tx, "SL_NONE", None).unwrap(), 0);
        assert_eq!(ReservationLineRepository::sum_reserved_by_appointment_tx(&tx, "A1").unwrap(), 6);
    }

    #[test]
    fn test_pair_uniqueness_enforced_by_schema() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();

        ReservationLineRepository::insert_tx(&tx, &make_line("R1", "A1", 1, 0)).unwrap();
        let err = ReservationLineRepository::insert_tx(&tx, &make_line("R2", "A1", 1, 0)).unwrap_err();

        assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
    }

    #[test]
    fn test_reassign_and_delete() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();

        ReservationLineRepository::insert_tx(&tx, &make_line("R1", "A1", 4, 0)).unwrap();
        ReservationLineRepository::reassign_appointment_tx(&tx, "R1", "A2", "tester").unwrap();

        let line = ReservationLineRepository::find_tx(&tx, "R1").unwrap().unwrap();
        assert_eq!(line.appointment_id, "A2");

        ReservationLineRepository::delete_tx(&tx, "R1").unwrap();
        assert!(ReservationLineRepository::find_tx(&tx, "R1").unwrap().is_none());
        assert!(matches!(
            ReservationLineRepository::delete_tx(&tx, "R1"),
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
