// ==========================================
// 物流托盘预约系统 - 预约配置读取 Trait
// ==========================================
// 职责: 定义 API 层所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use std::error::Error;

/// 批量新建的硬上限（配置只能调低，不能调高）
pub const BATCH_CREATE_HARD_LIMIT: usize = 50;

// ==========================================
// BookingConfigReader Trait
// ==========================================
// 用途: 预约 API 读取批量上限与同步开关
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait BookingConfigReader: Send + Sync {
    /// 批量新建最大条数
    ///
    /// # 默认值
    /// - 50（超过 50 的配置按 50 处理）
    fn get_batch_create_max_items(&self) -> Result<usize, Box<dyn Error>>;

    /// 批量转移最大条数
    ///
    /// # 默认值
    /// - 200
    fn get_batch_move_max_items(&self) -> Result<usize, Box<dyn Error>>;

    /// 是否在提交后同步订单级汇总
    ///
    /// # 默认值
    /// - true
    fn is_order_summary_sync_enabled(&self) -> Result<bool, Box<dyn Error>>;
}
