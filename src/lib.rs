// ==========================================
// 物流托盘预约系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 托盘容量预约与对账引擎
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 账本与容量规则
pub mod engine;

// 同步层 - 提交后的订单汇总同步
pub mod sync;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{AppointmentStatus, CapacitySourceKind};

// 领域实体
pub use domain::{
    ActionLog, ActionType, Appointment, CapacityAccount, CapacitySource, DispatchTask,
    OrderBookingSummary, PhysicalLot, ReservationLine, ShipmentLine,
};

// 引擎
pub use engine::{
    BatchReservationItem, BookingError, BookingLedger, CascadeService, RecalcService,
    ReconcileReport, ReconcileService,
};

// API
pub use api::{ApiError, ApiResult, AppointmentApi, ErrorResponse, LedgerAuditApi, ReservationApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "物流托盘预约系统";
