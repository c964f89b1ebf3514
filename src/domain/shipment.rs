// ==========================================
// 物流托盘预约系统 - 订单明细 / 实物批次领域模型
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// ShipmentLine - 订单明细（按目的地拆分）
// ==========================================
// 用途: 容量需求的基本单位
// 红线: 有预约引用时不可删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub shipment_line_id: String,    // 明细ID
    pub order_id: String,            // 所属订单
    pub destination: Option<String>, // 目的地
    pub declared_units: i64,         // 申报托数（到货前的预估容量）
    pub remaining_units: i64,        // 未到货时可供预约的托数（派生计数器）
}

// ==========================================
// PhysicalLot - 实物批次（已入库货物）
// ==========================================
// 红线: counted_units > 0 时覆盖 ShipmentLine.declared_units 成为权威容量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalLot {
    pub lot_id: String,                      // 批次ID
    pub shipment_line_id: String,            // 对应订单明细
    pub warehouse_code: Option<String>,      // 仓库
    pub counted_units: i64,                  // 实点托数
    pub available_units: i64,                // 可供预约的托数（派生计数器）
    pub received_at: Option<NaiveDateTime>,  // 入库时间
}

impl PhysicalLot {
    /// 是否可作为权威容量来源
    pub fn is_authoritative(&self) -> bool {
        self.counted_units > 0
    }
}
