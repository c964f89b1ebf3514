// ==========================================
// 物流托盘预约系统 - 实物批次数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 批次由收货流程登记（不在本引擎范围），
//       引擎只读取 counted_units 并改写 available_units
// ==========================================

use crate::domain::shipment::PhysicalLot;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// PhysicalLotRepository - 实物批次仓储
// ==========================================
pub struct PhysicalLotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PhysicalLotRepository {
    /// 创建新的实物批次仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记实物批次
    ///
    /// # 红线
    /// - 每个订单明细至多一条批次（UNIQUE shipment_line_id）
    pub fn insert(&self, lot: &PhysicalLot) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO physical_lot (
                lot_id, shipment_line_id, warehouse_code,
                counted_units, available_units, received_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                lot.lot_id,
                lot.shipment_line_id,
                lot.warehouse_code,
                lot.counted_units,
                lot.available_units,
                lot.received_at.as_ref().map(fmt_ts),
            ],
        )?;

        Ok(())
    }

    /// 按订单明细查询批次
    pub fn find_by_shipment_line(&self, shipment_line_id: &str) -> RepositoryResult<Option<PhysicalLot>> {
        let conn = self.get_conn()?;
        Self::find_on(&conn, shipment_line_id)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 事务内按订单明细查询批次
    pub fn find_by_shipment_line_tx(
        tx: &Transaction,
        shipment_line_id: &str,
    ) -> RepositoryResult<Option<PhysicalLot>> {
        Self::find_on(tx, shipment_line_id)
    }

    /// 事务内写入 available_units
    pub fn set_available_units_tx(tx: &Transaction, lot_id: &str, available_units: i64) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE physical_lot
            SET available_units = ?2, updated_at = datetime('now')
            WHERE lot_id = ?1
            "#,
            params![lot_id, available_units],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("PhysicalLot", lot_id));
        }
        Ok(())
    }

    /// 事务内增加 available_units（整单删除预约时回补）
    pub fn add_available_units_tx(tx: &Transaction, lot_id: &str, delta: i64) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE physical_lot
            SET available_units = available_units + ?2, updated_at = datetime('now')
            WHERE lot_id = ?1
            "#,
            params![lot_id, delta],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("PhysicalLot", lot_id));
        }
        Ok(())
    }

    fn find_on(conn: &Connection, shipment_line_id: &str) -> RepositoryResult<Option<PhysicalLot>> {
        let lot = conn
            .query_row(
                r#"
                SELECT lot_id, shipment_line_id, warehouse_code,
                       counted_units, available_units, received_at
                FROM physical_lot
                WHERE shipment_line_id = ?1
                "#,
                params![shipment_line_id],
                Self::map_row,
            )
            .optional()?;
        Ok(lot)
    }

    /// 映射数据库行到PhysicalLot对象
    fn map_row(row: &Row) -> SqliteResult<PhysicalLot> {
        let received_at = match row.get::<_, Option<String>>(5)? {
            Some(raw) => Some(parse_ts(5, &raw)?),
            None => None,
        };

        Ok(PhysicalLot {
            lot_id: row.get(0)?,
            shipment_line_id: row.get(1)?,
            warehouse_code: row.get(2)?,
            counted_units: row.get(3)?,
            available_units: row.get(4)?,
            received_at,
        })
    }
}
