// ==========================================
// 物流托盘预约系统 - 提交后同步层
// ==========================================
// 职责: 实现 Engine 层定义的 BookingEventPublisher
// 红线: 只在账本事务提交后调用；失败由调用方记录日志，不回滚
// ==========================================

pub mod order_summary_adapter;

pub use order_summary_adapter::OrderSummarySyncPublisher;
