// ==========================================
// 物流托盘预约系统 - 订单级预约汇总仓储
// ==========================================
// 用途: 预约变更后的父订单汇总（由 sync 模块 best-effort 刷新）
// ==========================================

use crate::domain::appointment::OrderBookingSummary;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{fmt_ts, now_ts, parse_ts};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderSummaryRepository - 订单汇总仓储
// ==========================================
pub struct OrderSummaryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderSummaryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按订单重算汇总并写回
    ///
    /// 汇总口径直接取自 reservation_line，不依赖计数器缓存
    pub fn refresh_for_order(&self, order_id: &str) -> RepositoryResult<OrderBookingSummary> {
        let conn = self.get_conn()?;

        let (line_count, appointment_count, reserved_units, effective_units): (i64, i64, i64, i64) =
            conn.query_row(
                r#"
                SELECT COUNT(DISTINCT r.shipment_line_id),
                       COUNT(DISTINCT r.appointment_id),
                       COALESCE(SUM(r.reserved_units), 0),
                       COALESCE(SUM(r.reserved_units - r.rejected_units), 0)
                FROM reservation_line r
                JOIN shipment_line s ON s.shipment_line_id = r.shipment_line_id
                WHERE s.order_id = ?1
                "#,
                params![order_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let summary = OrderBookingSummary {
            order_id: order_id.to_string(),
            line_count,
            appointment_count,
            reserved_units,
            effective_units,
            synced_at: now_ts(),
        };

        conn.execute(
            r#"
            INSERT INTO order_booking_summary (
                order_id, line_count, appointment_count, reserved_units, effective_units, synced_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(order_id) DO UPDATE SET
                line_count = excluded.line_count,
                appointment_count = excluded.appointment_count,
                reserved_units = excluded.reserved_units,
                effective_units = excluded.effective_units,
                synced_at = excluded.synced_at
            "#,
            params![
                summary.order_id,
                summary.line_count,
                summary.appointment_count,
                summary.reserved_units,
                summary.effective_units,
                fmt_ts(&summary.synced_at),
            ],
        )?;

        Ok(summary)
    }

    /// 查询订单汇总
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Option<OrderBookingSummary>> {
        let conn = self.get_conn()?;

        let summary = conn
            .query_row(
                r#"
                SELECT order_id, line_count, appointment_count, reserved_units, effective_units, synced_at
                FROM order_booking_summary
                WHERE order_id = ?1
                "#,
                params![order_id],
                |row| {
                    Ok(OrderBookingSummary {
                        order_id: row.get(0)?,
                        line_count: row.get(1)?,
                        appointment_count: row.get(2)?,
                        reserved_units: row.get(3)?,
                        effective_units: row.get(4)?,
                        synced_at: parse_ts(5, &row.get::<_, String>(5)?)?,
                    })
                },
            )
            .optional()?;

        Ok(summary)
    }
}
