// ==========================================
// 物流托盘预约系统 - 容量来源解析
// ==========================================
// 规则: 实物批次存在且 counted_units > 0 → 以批次为准
//       否则 → 以订单明细 declared_units 为准
// 红线: 每次变更操作重新解析，不跨事务缓存
// ==========================================

use crate::domain::capacity::{CapacityAccount, CapacitySource};
use crate::engine::error::{BookingError, BookingResult};
use crate::repository::{PhysicalLotRepository, ShipmentLineRepository};
use rusqlite::Transaction;
use tracing::trace;

// ==========================================
// CapacitySourceResolver - 容量来源解析器
// ==========================================
pub struct CapacitySourceResolver;

impl CapacitySourceResolver {
    /// 解析订单明细的权威容量来源
    ///
    /// # 错误
    /// - NotFound: 订单明细不存在
    pub fn resolve_tx(tx: &Transaction, shipment_line_id: &str) -> BookingResult<CapacitySource> {
        let line = ShipmentLineRepository::find_tx(tx, shipment_line_id)?
            .ok_or_else(|| BookingError::not_found("ShipmentLine", shipment_line_id))?;

        let source = match PhysicalLotRepository::find_by_shipment_line_tx(tx, shipment_line_id)? {
            Some(lot) if lot.is_authoritative() => CapacitySource::PhysicalLot {
                lot_id: lot.lot_id,
                shipment_line_id: lot.shipment_line_id,
                counted_units: lot.counted_units,
                available_units: lot.available_units,
            },
            _ => CapacitySource::ShipmentLine {
                shipment_line_id: line.shipment_line_id,
                declared_units: line.declared_units,
                remaining_units: line.remaining_units,
            },
        };

        trace!(
            shipment_line_id,
            source = %source.kind(),
            capacity = source.capacity_units(),
            "容量来源已解析"
        );
        Ok(source)
    }

    /// 将来源上的可用量计数器写回对应表
    pub fn persist_available_tx(tx: &Transaction, source: &CapacitySource) -> BookingResult<()> {
        match source {
            CapacitySource::PhysicalLot {
                lot_id,
                available_units,
                ..
            } => PhysicalLotRepository::set_available_units_tx(tx, lot_id, *available_units)?,
            CapacitySource::ShipmentLine {
                shipment_line_id,
                remaining_units,
                ..
            } => ShipmentLineRepository::set_remaining_units_tx(tx, shipment_line_id, *remaining_units)?,
        }
        Ok(())
    }

    /// 按增量调整来源上的可用量计数器
    pub fn credit_available_tx(tx: &Transaction, source: &CapacitySource, delta: i64) -> BookingResult<()> {
        match source {
            CapacitySource::PhysicalLot { lot_id, .. } => {
                PhysicalLotRepository::add_available_units_tx(tx, lot_id, delta)?
            }
            CapacitySource::ShipmentLine { shipment_line_id, .. } => {
                ShipmentLineRepository::add_remaining_units_tx(tx, shipment_line_id, delta)?
            }
        }
        Ok(())
    }
}
