// ==========================================
// 物流托盘预约系统 - 引擎层
// ==========================================
// 职责: 容量来源解析、账本写入、可用量重算、级联删除、对账
// 红线: Engine 不拼 SQL（只调 Repository 的 *_tx 接口）
// 红线: BookingLedger 是账本唯一写入者
// ==========================================

pub mod aggregate;
pub mod booking;
pub mod capacity_resolver;
pub mod cascade;
pub mod error;
pub mod events;
pub mod recalc;
pub mod reconcile;
pub mod transaction;

// 重导出核心引擎
pub use aggregate::{AggregateStatus, AppointmentAggregate};
pub use booking::{BatchReservationItem, BookingLedger, LedgerOutcome, MAX_BATCH_CREATE_ITEMS};
pub use capacity_resolver::CapacitySourceResolver;
pub use cascade::{BatchDeleteFailure, BatchDeleteOutcome, CascadeOutcome, CascadeService};
pub use error::{BookingError, BookingResult};
pub use events::{
    BookingEvent, BookingEventPublisher, BookingEventType, NoOpEventPublisher,
    OptionalEventPublisher,
};
pub use recalc::{CapacityStatus, RecalcOutcome, RecalcService};
pub use reconcile::{ReconcileReport, ReconcileService};
pub use transaction::TransactionCoordinator;
