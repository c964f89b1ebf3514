// ==========================================
// 物流托盘预约系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、容量来源抽象
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod appointment;
pub mod capacity;
pub mod shipment;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use appointment::{Appointment, DispatchTask, OrderBookingSummary, ReservationLine};
pub use capacity::{CapacityAccount, CapacitySource};
pub use shipment::{PhysicalLot, ShipmentLine};
pub use types::{AppointmentStatus, CapacitySourceKind};
