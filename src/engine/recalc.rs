// ==========================================
// 物流托盘预约系统 - 可用量重算服务
// ==========================================
// 公式: available = 权威容量 - Σ(reserved_units - rejected_units)
// 红线: 每次账本变更后对受影响的订单明细调用
// 红线: 幂等，连续调用两次结果相同
// ==========================================

use crate::domain::capacity::{CapacityAccount, CapacitySource};
use crate::domain::types::CapacitySourceKind;
use crate::engine::capacity_resolver::CapacitySourceResolver;
use crate::engine::error::BookingResult;
use crate::repository::ReservationLineRepository;
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

// ==========================================
// CapacityStatus - 单个订单明细的容量状态
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityStatus {
    pub shipment_line_id: String,
    pub source_kind: CapacitySourceKind,
    pub capacity_units: i64,     // 权威容量
    pub effective_total: i64,    // 当前净占用合计
    pub stored_available: i64,   // 库里的可用量计数器
    pub expected_available: i64, // 按账本计算应有的可用量
}

impl CapacityStatus {
    /// 计数器与账本不一致
    pub fn is_drifted(&self) -> bool {
        self.stored_available != self.expected_available
    }

    /// 净占用超过权威容量（实物点数少于已预约量时出现）
    pub fn is_over_committed(&self) -> bool {
        self.expected_available < 0
    }
}

// ==========================================
// RecalcOutcome - 一次重算的结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecalcOutcome {
    pub shipment_line_id: String,
    pub source_kind: CapacitySourceKind,
    pub capacity_units: i64,
    pub effective_total: i64,
    pub previous_available: i64,
    pub available_units: i64,
}

impl RecalcOutcome {
    pub fn changed(&self) -> bool {
        self.previous_available != self.available_units
    }
}

// ==========================================
// RecalcService - 可用量重算
// ==========================================
pub struct RecalcService;

impl RecalcService {
    /// 读取容量状态（不写库）
    pub fn inspect_tx(tx: &Transaction, shipment_line_id: &str) -> BookingResult<CapacityStatus> {
        let source = CapacitySourceResolver::resolve_tx(tx, shipment_line_id)?;
        let effective_total = ReservationLineRepository::sum_effective_tx(tx, shipment_line_id, None)?;
        Ok(Self::status_of(shipment_line_id, &source, effective_total))
    }

    /// 按账本重算并写回权威来源的可用量
    #[instrument(skip(tx))]
    pub fn recalc_tx(tx: &Transaction, shipment_line_id: &str) -> BookingResult<RecalcOutcome> {
        let effective_total = ReservationLineRepository::sum_effective_tx(tx, shipment_line_id, None)?;
        let mut source = CapacitySourceResolver::resolve_tx(tx, shipment_line_id)?;

        let previous_available = source.available_units();
        let available_units = source.expected_available(effective_total);

        if previous_available != available_units {
            source.set_available_units(available_units);
            CapacitySourceResolver::persist_available_tx(tx, &source)?;
        }

        debug!(
            source = %source.kind(),
            capacity = source.capacity_units(),
            effective_total,
            previous_available,
            available_units,
            "可用量已重算"
        );

        Ok(RecalcOutcome {
            shipment_line_id: shipment_line_id.to_string(),
            source_kind: source.kind(),
            capacity_units: source.capacity_units(),
            effective_total,
            previous_available,
            available_units,
        })
    }

    /// 对一组订单明细逐个重算（按首次出现顺序去重）
    pub fn recalc_many_tx<'a, I>(tx: &Transaction, shipment_line_ids: I) -> BookingResult<Vec<RecalcOutcome>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut seen: Vec<&str> = Vec::new();
        let mut outcomes = Vec::new();
        for id in shipment_line_ids {
            if seen.contains(&id) {
                continue;
            }
            seen.push(id);
            outcomes.push(Self::recalc_tx(tx, id)?);
        }
        Ok(outcomes)
    }

    fn status_of(shipment_line_id: &str, source: &CapacitySource, effective_total: i64) -> CapacityStatus {
        CapacityStatus {
            shipment_line_id: shipment_line_id.to_string(),
            source_kind: source.kind(),
            capacity_units: source.capacity_units(),
            effective_total,
            stored_available: source.available_units(),
            expected_available: source.expected_available(effective_total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            r#"
            INSERT INTO shipment_line (shipment_line_id, order_id, declared_units, remaining_units)
                VALUES ('SL1', 'ORD1', 10, 99);
            INSERT INTO appointment (appointment_id, reference_code, created_at, updated_at)
                VALUES ('A1', 'APT-1', '2026-01-01 00:00:00', '2026-01-01 00:00:00'),
                       ('A2', 'APT-2', '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            INSERT INTO reservation_line (
                reservation_id, appointment_id, shipment_line_id,
                reserved_units, rejected_units, capacity_snapshot, created_at, updated_at
            ) VALUES
                ('R1', 'A1', 'SL1', 6, 2, 10, '2026-01-01 00:00:00', '2026-01-01 00:00:00'),
                ('R2', 'A2', 'SL1', 3, 0, 6, '2026-01-01 00:00:00', '2026-01-01 00:00:00');
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_recalc_is_idempotent() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();

        let before = RecalcService::inspect_tx(&tx, "SL1").unwrap();
        assert!(before.is_drifted());

        let first = RecalcService::recalc_tx(&tx, "SL1").unwrap();
        assert_eq!(first.effective_total, 7);
        assert_eq!(first.available_units, 3);
        assert!(first.changed());

        let second = RecalcService::recalc_tx(&tx, "SL1").unwrap();
        assert_eq!(second.available_units, 3);
        assert!(!second.changed());

        assert!(!RecalcService::inspect_tx(&tx, "SL1").unwrap().is_drifted());
    }

    #[test]
    fn test_recalc_many_dedupes() {
        let mut conn = setup();
        let tx = conn.transaction().unwrap();

        let outcomes = RecalcService::recalc_many_tx(&tx, ["SL1", "SL1"]).unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    #[test]
    fn test_short_count_lot_reports_over_commitment() {
        let mut conn = setup();
        conn.execute(
            "INSERT INTO physical_lot (lot_id, shipment_line_id, counted_units, available_units) VALUES ('LOT1', 'SL1', 5, 5)",
            [],
        )
        .unwrap();
        let tx = conn.transaction().unwrap();

        let outcome = RecalcService::recalc_tx(&tx, "SL1").unwrap();
        assert_eq!(outcome.source_kind, CapacitySourceKind::PhysicalLot);
        assert_eq!(outcome.available_units, -2);
        assert!(RecalcService::inspect_tx(&tx, "SL1").unwrap().is_over_committed());
    }
}
