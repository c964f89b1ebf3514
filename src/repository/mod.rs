// ==========================================
// 物流托盘预约系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约定: `*_tx` 关联函数只在引擎持有的事务内调用,不自行加锁
// ==========================================

pub mod action_log_repo;
pub mod appointment_repo;
pub mod dispatch_task_repo;
pub mod error;
pub mod lot_repo;
pub mod order_summary_repo;
pub mod reservation_repo;
pub mod shipment_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use appointment_repo::AppointmentRepository;
pub use dispatch_task_repo::DispatchTaskRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use lot_repo::PhysicalLotRepository;
pub use order_summary_repo::OrderSummaryRepository;
pub use reservation_repo::ReservationLineRepository;
pub use shipment_repo::ShipmentLineRepository;

use crate::db::TS_FORMAT;
use chrono::NaiveDateTime;

/// 时间戳写库格式化
pub(crate) fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

/// 时间戳读库解析（列序号用于错误定位）
pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TS_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 当前本地时间（精确到秒，与库内格式一致）
pub(crate) fn now_ts() -> NaiveDateTime {
    let now = chrono::Local::now().naive_local();
    parse_ts(0, &fmt_ts(&now)).unwrap_or(now)
}
