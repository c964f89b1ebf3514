// ==========================================
// 物流托盘预约系统 - 容量来源领域模型
// ==========================================
// 红线: 容量来源每次变更操作都重新解析，不缓存
// 用途: 实物批次 / 订单明细 两种来源统一成一个抽象，
//       一次解析后向下传递，调用方不再各自分支判断
// ==========================================

use crate::domain::types::CapacitySourceKind;
use serde::{Deserialize, Serialize};

// ==========================================
// CapacitySource - 权威容量来源
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacitySource {
    /// 实物批次（counted_units > 0）
    PhysicalLot {
        lot_id: String,
        shipment_line_id: String,
        counted_units: i64,
        available_units: i64,
    },
    /// 订单明细申报托数
    ShipmentLine {
        shipment_line_id: String,
        declared_units: i64,
        remaining_units: i64,
    },
}

// ==========================================
// Trait: CapacityAccount
// ==========================================
// 用途: 对两种来源提供统一的 读容量 / 读写可用量 接口
pub trait CapacityAccount {
    /// 权威容量
    fn capacity_units(&self) -> i64;

    /// 当前存储的可用量计数器
    fn available_units(&self) -> i64;

    /// 改写可用量计数器（仅内存，落库由仓储负责）
    fn set_available_units(&mut self, units: i64);

    /// 来源类型
    fn kind(&self) -> CapacitySourceKind;

    /// 给定净占用合计，计算应有的可用量
    fn expected_available(&self, effective_total: i64) -> i64 {
        self.capacity_units() - effective_total
    }

    /// 给定其他明细的净占用，计算本明细可预约上限
    fn max_allowed(&self, other_effective: i64) -> i64 {
        self.capacity_units() - other_effective
    }
}

impl CapacitySource {
    /// 所属订单明细
    pub fn shipment_line_id(&self) -> &str {
        match self {
            CapacitySource::PhysicalLot { shipment_line_id, .. } => shipment_line_id,
            CapacitySource::ShipmentLine { shipment_line_id, .. } => shipment_line_id,
        }
    }
}

impl CapacityAccount for CapacitySource {
    fn capacity_units(&self) -> i64 {
        match self {
            CapacitySource::PhysicalLot { counted_units, .. } => *counted_units,
            CapacitySource::ShipmentLine { declared_units, .. } => *declared_units,
        }
    }

    fn available_units(&self) -> i64 {
        match self {
            CapacitySource::PhysicalLot { available_units, .. } => *available_units,
            CapacitySource::ShipmentLine { remaining_units, .. } => *remaining_units,
        }
    }

    fn set_available_units(&mut self, units: i64) {
        match self {
            CapacitySource::PhysicalLot { available_units, .. } => *available_units = units,
            CapacitySource::ShipmentLine { remaining_units, .. } => *remaining_units = units,
        }
    }

    fn kind(&self) -> CapacitySourceKind {
        match self {
            CapacitySource::PhysicalLot { .. } => CapacitySourceKind::PhysicalLot,
            CapacitySource::ShipmentLine { .. } => CapacitySourceKind::ShipmentLine,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lot(counted: i64, available: i64) -> CapacitySource {
        CapacitySource::PhysicalLot {
            lot_id: "LOT1".to_string(),
            shipment_line_id: "SL1".to_string(),
            counted_units: counted,
            available_units: available,
        }
    }

    #[test]
    fn test_uniform_accessors() {
        let mut source = lot(12, 12);
        assert_eq!(source.kind(), CapacitySourceKind::PhysicalLot);
        assert_eq!(source.capacity_units(), 12);
        assert_eq!(source.max_allowed(5), 7);

        source.set_available_units(3);
        assert_eq!(source.available_units(), 3);
        assert_eq!(source.shipment_line_id(), "SL1");

        let mut line = CapacitySource::ShipmentLine {
            shipment_line_id: "SL2".to_string(),
            declared_units: 10,
            remaining_units: 10,
        };
        line.set_available_units(4);
        assert_eq!(line.kind(), CapacitySourceKind::ShipmentLine);
        assert_eq!(line.available_units(), 4);
        assert_eq!(line.expected_available(6), 4);
    }

    #[test]
    fn test_max_allowed_can_go_negative() {
        // 实物点数少于已有净占用
        let source = lot(3, -2);
        assert_eq!(source.max_allowed(5), -2);
    }
}
