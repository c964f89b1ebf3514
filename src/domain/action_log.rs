// ==========================================
// 物流托盘预约系统 - 操作日志领域模型
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 红线: 所有成功的账本写入必须记录
// 用途: 审计追踪
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,              // 日志ID
    pub action_type: String,            // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,       // 操作时间戳
    pub actor: String,                  // 操作人
    pub appointment_id: Option<String>, // 关联预约 (批量删除等可为None)
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)
    pub detail: Option<String>,         // 详细描述
}

impl ActionLog {
    /// 以当前时间创建一条日志
    pub fn now(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            appointment_id: None,
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_appointment(mut self, appointment_id: &str) -> Self {
        self.appointment_id = Some(appointment_id.to_string());
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: String) -> Self {
        self.detail = Some(detail);
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateReservation,       // 新建预约明细
    UpdateReservation,       // 修改预约/拒收托数
    DeleteReservation,       // 删除预约明细
    BatchCreateReservations, // 批量新建
    BatchMoveReservations,   // 批量转移到其他预约
    DeleteAppointment,       // 整单删除预约（级联）
    RecalculateCapacity,     // 人工触发重算
    ReconcileLedger,         // 账本对账
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateReservation => "CREATE_RESERVATION",
            ActionType::UpdateReservation => "UPDATE_RESERVATION",
            ActionType::DeleteReservation => "DELETE_RESERVATION",
            ActionType::BatchCreateReservations => "BATCH_CREATE_RESERVATIONS",
            ActionType::BatchMoveReservations => "BATCH_MOVE_RESERVATIONS",
            ActionType::DeleteAppointment => "DELETE_APPOINTMENT",
            ActionType::RecalculateCapacity => "RECALCULATE_CAPACITY",
            ActionType::ReconcileLedger => "RECONCILE_LEDGER",
        }
    }
}
