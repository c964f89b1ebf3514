// ==========================================
// 物流托盘预约系统 - 领域枚举类型
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// CapacitySourceKind - 容量来源类型
// ==========================================
/// 权威容量来源
///
/// - PhysicalLot: 货物已实物入库且点数 > 0，以实物批次点数为准
/// - ShipmentLine: 货物未到，以订单明细的申报托数为准
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CapacitySourceKind {
    PhysicalLot,
    ShipmentLine,
}

impl CapacitySourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacitySourceKind::PhysicalLot => "PHYSICAL_LOT",
            CapacitySourceKind::ShipmentLine => "SHIPMENT_LINE",
        }
    }
}

impl fmt::Display for CapacitySourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// AppointmentStatus - 预约状态
// ==========================================
// 状态流转由预约管理模块负责，本引擎只读写 total_units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,  // 已排期
    CheckedIn,  // 已到场
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl AppointmentStatus {
    /// 转换为数据库字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
        }
    }

    /// 从数据库字符串解析（未知值按 SCHEDULED 处理）
    pub fn from_db_str(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "CHECKED_IN" => AppointmentStatus::CheckedIn,
            "COMPLETED" => AppointmentStatus::Completed,
            "CANCELLED" => AppointmentStatus::Cancelled,
            _ => AppointmentStatus::Scheduled,
        }
    }
}
