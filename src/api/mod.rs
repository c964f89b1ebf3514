// ==========================================
// 物流托盘预约系统 - API 层
// ==========================================
// 职责: 入参校验、错误归类、提交后审计与同步
// ==========================================

pub mod appointment_api;
pub mod error;
pub mod ledger_audit_api;
pub(crate) mod post_commit;
pub mod reservation_api;

// 重导出核心类型
pub use appointment_api::{AppointmentApi, BatchDeleteResponse};
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use ledger_audit_api::LedgerAuditApi;
pub use reservation_api::ReservationApi;
