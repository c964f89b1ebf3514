// ==========================================
// 物流托盘预约系统 - 预约 / 预约明细领域模型
// ==========================================

use crate::domain::types::AppointmentStatus;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ==========================================
// Appointment - 送货预约
// ==========================================
// 红线: total_units 只由预约引擎维护
//
// total_units 口径: 各预约明细 reserved_units 之和（毛量，不扣 rejected_units）。
// 这是给调度看的“计划托数”，与容量来源上的可用量（按净占用计算）是两套口径，
// 两者不相等是正常现象，不要在这里改成净量。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub appointment_id: String,              // 预约ID
    pub reference_code: String,              // 预约单号
    pub status: AppointmentStatus,           // 状态
    pub scheduled_at: Option<NaiveDateTime>, // 预约时间
    pub total_units: i64,                    // 计划托数缓存（毛量）
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
}

// ==========================================
// ReservationLine - 预约明细（账本原子记录）
// ==========================================
// 红线: 同一 (appointment_id, shipment_line_id) 至多一条
// 红线: 0 <= rejected_units <= reserved_units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationLine {
    pub reservation_id: String,     // 明细ID
    pub appointment_id: String,     // 所属预约
    pub shipment_line_id: String,   // 占用的订单明细
    pub reserved_units: i64,        // 预约托数
    pub rejected_units: i64,        // 拒收/退回托数
    pub capacity_snapshot: i64,     // 创建时可预约上限（仅审计，不参与重算）
    pub created_at: NaiveDateTime,
    pub created_by: Option<String>,
    pub updated_at: NaiveDateTime,
    pub updated_by: Option<String>,
}

impl ReservationLine {
    /// 净占用 = reserved_units - rejected_units
    pub fn effective_units(&self) -> i64 {
        self.reserved_units - self.rejected_units
    }
}

// ==========================================
// DispatchTask - 预约下游调度记录
// ==========================================
// 用途: 月台分配、装卸任务等挂在预约下的下游记录，删除预约时级联删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchTask {
    pub task_id: String,
    pub appointment_id: String,
    pub task_type: String,
    pub payload_json: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

// ==========================================
// OrderBookingSummary - 订单级预约汇总
// ==========================================
// 用途: 预约变更后同步到父订单的汇总（best-effort）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookingSummary {
    pub order_id: String,
    pub line_count: i64,         // 订单下有预约的明细数
    pub appointment_count: i64,  // 涉及的预约数
    pub reserved_units: i64,     // 预约毛量
    pub effective_units: i64,    // 预约净量
    pub synced_at: NaiveDateTime,
}
