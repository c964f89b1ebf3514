// ==========================================
// 物流托盘预约系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod booking_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use booking_config_trait::{BookingConfigReader, BATCH_CREATE_HARD_LIMIT};
pub use config_manager::{config_keys, ConfigManager};
