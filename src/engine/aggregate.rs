// ==========================================
// 物流托盘预约系统 - 预约计划托数汇总
// ==========================================
// 口径: Appointment.total_units = Σ reserved_units（毛量，拒收不扣减）
// 红线: 只由 BookingLedger / CascadeService / ReconcileService 在事务内调用，
//       与账本变更同事务提交
// ==========================================

use crate::engine::error::BookingResult;
use crate::repository::{AppointmentRepository, ReservationLineRepository};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 汇总核对结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub appointment_id: String,
    pub stored_total: i64,
    pub computed_total: i64,
}

impl AggregateStatus {
    pub fn is_drifted(&self) -> bool {
        self.stored_total != self.computed_total
    }
}

pub struct AppointmentAggregate;

impl AppointmentAggregate {
    /// 增量调整 total_units（delta 为 0 时不写库）
    pub fn apply_delta_tx(tx: &Transaction, appointment_id: &str, delta: i64, actor: &str) -> BookingResult<()> {
        if delta == 0 {
            return Ok(());
        }
        AppointmentRepository::add_total_units_tx(tx, appointment_id, delta, actor)?;
        debug!(appointment_id, delta, "预约计划托数已调整");
        Ok(())
    }

    /// 按账本核对 total_units（不写库）
    pub fn inspect_tx(tx: &Transaction, appointment_id: &str) -> BookingResult<AggregateStatus> {
        let appointment = AppointmentRepository::require_tx(tx, appointment_id)?;
        let computed_total = ReservationLineRepository::sum_reserved_by_appointment_tx(tx, appointment_id)?;
        Ok(AggregateStatus {
            appointment_id: appointment.appointment_id,
            stored_total: appointment.total_units,
            computed_total,
        })
    }

    /// 按账本重写 total_units
    pub fn recompute_tx(tx: &Transaction, appointment_id: &str, actor: &str) -> BookingResult<AggregateStatus> {
        let status = Self::inspect_tx(tx, appointment_id)?;
        if status.is_drifted() {
            AppointmentRepository::set_total_units_tx(tx, appointment_id, status.computed_total, actor)?;
            debug!(
                appointment_id,
                stored = status.stored_total,
                computed = status.computed_total,
                "预约计划托数已按账本重写"
            );
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use rusqlite::Connection;

    #[test]
    fn test_gross_total_ignores_rejections() {
        let mut conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO shipment_line (shipment_line_id, order_id, declared_units, remaining_units)
                VALUES ('SL1', 'ORD1', 10, 4);
            INSERT INTO appointment (appointment_id, reference_code, total_units, created_at, updated_at)
                VALUES ('A1', 'APT-1', 1, '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            INSERT INTO reservation_line (
                reservation_id, appointment_id, shipment_line_id,
                reserved_units, rejected_units, capacity_snapshot, created_at, updated_at
            ) VALUES ('R1', 'A1', 'SL1', 6, 2, 10, '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            "#,
        )
        .unwrap();

        let tx = conn.transaction().unwrap();
        let status = AppointmentAggregate::recompute_tx(&tx, "A1", "tester").unwrap();
        assert!(status.is_drifted());
        assert_eq!(status.computed_total, 6);

        AppointmentAggregate::apply_delta_tx(&tx, "A1", -1, "tester").unwrap();
        let after = AppointmentAggregate::inspect_tx(&tx, "A1").unwrap();
        assert_eq!(after.stored_total, 5);
    }
}
