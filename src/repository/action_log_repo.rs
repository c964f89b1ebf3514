// ==========================================
// 物流托盘预约系统 - 操作日志数据仓储
// ==========================================
// 依据: action_log 表（db::init_schema）
// 红线: 所有成功的账本写入必须记录
// 红线: 日志写入在账本事务提交之后，失败不回滚账本
// ==========================================

mod core;
mod queries;


pub use core::ActionLogRepository;
