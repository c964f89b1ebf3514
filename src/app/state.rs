// ==========================================
// 物流托盘预约系统 - 应用状态
// ==========================================
// 职责: 打开数据库、初始化 schema、装配仓储/引擎/API
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::post_commit::PostCommitHooks;
use crate::api::{AppointmentApi, LedgerAuditApi, ReservationApi};
use crate::config::{BookingConfigReader, ConfigManager};
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::events::{BookingEventPublisher, OptionalEventPublisher};
use crate::engine::{BookingLedger, CascadeService, ReconcileService, TransactionCoordinator};
use crate::repository::{
    ActionLogRepository, AppointmentRepository, DispatchTaskRepository, OrderSummaryRepository,
    PhysicalLotRepository, ReservationLineRepository, ShipmentLineRepository,
};
use crate::sync::OrderSummarySyncPublisher;

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 预约明细API
    pub reservation_api: Arc<ReservationApi>,

    /// 预约（整单）API
    pub appointment_api: Arc<AppointmentApi>,

    /// 账本对账API
    pub ledger_audit_api: Arc<LedgerAuditApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 订单明细仓储（订单拆分流程登记明细用）
    pub shipment_repo: Arc<ShipmentLineRepository>,

    /// 实物批次仓储（收货流程登记批次用）
    pub lot_repo: Arc<PhysicalLotRepository>,

    /// 预约仓储（预约管理模块新建预约用）
    pub appointment_repo: Arc<AppointmentRepository>,

    /// 下游调度记录仓储
    pub dispatch_task_repo: Arc<DispatchTaskRepository>,

    /// 订单汇总仓储
    pub order_summary_repo: Arc<OrderSummaryRepository>,

    /// 操作日志仓储（用于审计追踪）
    pub action_log_repo: Arc<ActionLogRepository>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并初始化 schema（幂等）
    /// 2. 初始化所有Repository
    /// 3. 初始化引擎与事件发布器
    /// 4. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("初始化数据库结构失败: {}", e))?;

        Self::from_connection(db_path, Arc::new(Mutex::new(conn)))
    }

    /// 基于已有连接装配（连接需已初始化 schema）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let shipment_repo = Arc::new(ShipmentLineRepository::new(conn.clone()));
        let lot_repo = Arc::new(PhysicalLotRepository::new(conn.clone()));
        let appointment_repo = Arc::new(AppointmentRepository::new(conn.clone()));
        let reservation_repo = Arc::new(ReservationLineRepository::new(conn.clone()));
        let dispatch_task_repo = Arc::new(DispatchTaskRepository::new(conn.clone()));
        let order_summary_repo = Arc::new(OrderSummaryRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法初始化配置管理器: {}", e))?,
        );
        let config_reader: Arc<dyn BookingConfigReader> = config_manager.clone();

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let coordinator = TransactionCoordinator::new(conn.clone());
        let ledger = Arc::new(BookingLedger::new(coordinator.clone()));
        let cascade = Arc::new(CascadeService::new(coordinator.clone()));
        let reconcile = Arc::new(ReconcileService::new(coordinator.clone()));

        // 事件发布器：提交后同步订单汇总
        let publisher: Arc<dyn BookingEventPublisher> = Arc::new(OrderSummarySyncPublisher::new(
            shipment_repo.clone(),
            order_summary_repo.clone(),
        ));
        let event_publisher = OptionalEventPublisher::with_publisher(publisher);

        let hooks = || {
            PostCommitHooks::new(
                action_log_repo.clone(),
                config_reader.clone(),
                event_publisher.clone(),
            )
        };

        // ==========================================
        // 创建API实例
        // ==========================================
        let reservation_api = Arc::new(ReservationApi::new(
            ledger,
            coordinator,
            reservation_repo,
            appointment_repo.clone(),
            config_reader.clone(),
            hooks(),
        ));
        let appointment_api = Arc::new(AppointmentApi::new(cascade, appointment_repo.clone(), hooks()));
        let ledger_audit_api = Arc::new(LedgerAuditApi::new(reconcile, action_log_repo.clone(), hooks()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            reservation_api,
            appointment_api,
            ledger_audit_api,
            config_manager,
            shipment_repo,
            lot_repo,
            appointment_repo,
            dispatch_task_repo,
            order_summary_repo,
            action_log_repo,
        })
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 PALLET_BOOKING_DB > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("PALLET_BOOKING_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./pallet_booking.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        let dir = data_dir.join("pallet-booking-dev");

        #[cfg(not(debug_assertions))]
        let dir = data_dir.join("pallet-booking");

        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("pallet_booking.db");
        }
    }

    path.to_string_lossy().to_string()
}
