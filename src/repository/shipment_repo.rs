// ==========================================
// 物流托盘预约系统 - 订单明细数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 说明: 订单明细由订单拆分流程创建（不在本引擎范围），
//       这里仅提供登记/查询与 remaining_units 计数器的写入
// ==========================================

use crate::domain::shipment::ShipmentLine;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row, Transaction};
use std::sync::{Arc, Mutex};

// ==========================================
// ShipmentLineRepository - 订单明细仓储
// ==========================================
pub struct ShipmentLineRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ShipmentLineRepository {
    /// 创建新的订单明细仓储实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 登记订单明细
    ///
    /// remaining_units 初始等于 declared_units（尚无预约）
    pub fn insert(&self, line: &ShipmentLine) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO shipment_line (
                shipment_line_id, order_id, destination, declared_units, remaining_units
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                line.shipment_line_id,
                line.order_id,
                line.destination,
                line.declared_units,
                line.remaining_units,
            ],
        )?;

        Ok(())
    }

    /// 按ID查询订单明细
    pub fn find_by_id(&self, shipment_line_id: &str) -> RepositoryResult<Option<ShipmentLine>> {
        let conn = self.get_conn()?;
        Self::find_on(&conn, shipment_line_id)
    }

    /// 查询订单下的所有明细
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ShipmentLine>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT shipment_line_id, order_id, destination, declared_units, remaining_units
            FROM shipment_line
            WHERE order_id = ?1
            ORDER BY shipment_line_id
            "#,
        )?;

        let lines = stmt
            .query_map(params![order_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(lines)
    }

    // ==========================================
    // 事务内操作
    // ==========================================

    /// 事务内按ID查询
    pub fn find_tx(tx: &Transaction, shipment_line_id: &str) -> RepositoryResult<Option<ShipmentLine>> {
        Self::find_on(tx, shipment_line_id)
    }

    /// 事务内写入 remaining_units
    pub fn set_remaining_units_tx(
        tx: &Transaction,
        shipment_line_id: &str,
        remaining_units: i64,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE shipment_line
            SET remaining_units = ?2, updated_at = datetime('now')
            WHERE shipment_line_id = ?1
            "#,
            params![shipment_line_id, remaining_units],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ShipmentLine", shipment_line_id));
        }
        Ok(())
    }

    /// 事务内增加 remaining_units（整单删除预约时回补）
    pub fn add_remaining_units_tx(
        tx: &Transaction,
        shipment_line_id: &str,
        delta: i64,
    ) -> RepositoryResult<()> {
        let affected = tx.execute(
            r#"
            UPDATE shipment_line
            SET remaining_units = remaining_units + ?2, updated_at = datetime('now')
            WHERE shipment_line_id = ?1
            "#,
            params![shipment_line_id, delta],
        )?;

        if affected == 0 {
            return Err(RepositoryError::not_found("ShipmentLine", shipment_line_id));
        }
        Ok(())
    }

    /// 事务内列出所有明细ID（对账用）
    pub fn list_ids_tx(tx: &Transaction) -> RepositoryResult<Vec<String>> {
        let mut stmt = tx.prepare("SELECT shipment_line_id FROM shipment_line ORDER BY shipment_line_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }

    /// 查询一组明细所属的订单（去重）
    pub fn order_ids_for_lines(&self, shipment_line_ids: &[String]) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT order_id FROM shipment_line WHERE shipment_line_id = ?1")?;

        let mut order_ids: Vec<String> = Vec::new();
        for id in shipment_line_ids {
            let order_id: Option<String> = stmt.query_row(params![id], |row| row.get(0)).optional()?;
            if let Some(order_id) = order_id {
                if !order_ids.contains(&order_id) {
                    order_ids.push(order_id);
                }
            }
        }
        Ok(order_ids)
    }

    fn find_on(conn: &Connection, shipment_line_id: &str) -> RepositoryResult<Option<ShipmentLine>> {
        let line = conn
            .query_row(
                r#"
                SELECT shipment_line_id, order_id, destination, declared_units, remaining_units
                FROM shipment_line
                WHERE shipment_line_id = ?1
                "#,
                params![shipment_line_id],
                Self::map_row,
            )
            .optional()?;
        Ok(line)
    }

    /// 映射数据库行到ShipmentLine对象
    fn map_row(row: &Row) -> SqliteResult<ShipmentLine> {
        Ok(ShipmentLine {
            shipment_line_id: row.get(0)?,
            order_id: row.get(1)?,
            destination: row.get(2)?,
            declared_units: row.get(3)?,
            remaining_units: row.get(4)?,
        })
    }
}
