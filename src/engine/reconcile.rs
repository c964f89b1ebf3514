// ==========================================
// 物流托盘预约系统 - 账本对账
// ==========================================
// 检查项:
// - 可用量计数器 = 权威容量 - Σ净占用
// - 预约计划托数 = Σ reserved_units
// 修复模式: 按账本重写派生计数器（账本本身不改）
// ==========================================

use crate::engine::aggregate::{AggregateStatus, AppointmentAggregate};
use crate::engine::error::BookingResult;
use crate::engine::recalc::{CapacityStatus, RecalcService};
use crate::engine::transaction::TransactionCoordinator;
use crate::repository::{AppointmentRepository, ShipmentLineRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// 对账报告
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub checked_shipment_lines: usize,
    pub checked_appointments: usize,
    /// 可用量计数器与账本不一致的订单明细
    pub capacity_drifts: Vec<CapacityStatus>,
    /// 净占用超过权威容量的订单明细（实物点数偏少）
    pub over_committed: Vec<CapacityStatus>,
    /// 计划托数与账本不一致的预约
    pub aggregate_drifts: Vec<AggregateStatus>,
    /// 是否已按账本修复
    pub repaired: bool,
}

impl ReconcileReport {
    /// 派生计数器全部一致
    pub fn is_consistent(&self) -> bool {
        self.capacity_drifts.is_empty() && self.aggregate_drifts.is_empty()
    }
}

// ==========================================
// ReconcileService - 对账服务
// ==========================================
pub struct ReconcileService {
    coordinator: TransactionCoordinator,
}

impl ReconcileService {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self { coordinator }
    }

    /// 全量对账
    ///
    /// # 参数
    /// - repair: true 时在同一事务内修复发现的偏差
    #[instrument(skip(self))]
    pub fn run(&self, repair: bool, actor: &str) -> BookingResult<ReconcileReport> {
        self.coordinator.run("reconcile_ledger", |tx| {
            let mut report = ReconcileReport::default();

            for shipment_line_id in ShipmentLineRepository::list_ids_tx(tx)? {
                let status = RecalcService::inspect_tx(tx, &shipment_line_id)?;
                report.checked_shipment_lines += 1;

                if status.is_over_committed() {
                    warn!(
                        shipment_line_id = %status.shipment_line_id,
                        capacity = status.capacity_units,
                        effective_total = status.effective_total,
                        "净占用超过权威容量"
                    );
                    report.over_committed.push(status.clone());
                }
                if status.is_drifted() {
                    if repair {
                        RecalcService::recalc_tx(tx, &shipment_line_id)?;
                    }
                    report.capacity_drifts.push(status);
                }
            }

            for appointment in AppointmentRepository::list_all_tx(tx)? {
                let status = AppointmentAggregate::inspect_tx(tx, &appointment.appointment_id)?;
                report.checked_appointments += 1;

                if status.is_drifted() {
                    if repair {
                        AppointmentAggregate::recompute_tx(tx, &appointment.appointment_id, actor)?;
                    }
                    report.aggregate_drifts.push(status);
                }
            }

            report.repaired = repair && !report.is_consistent();

            info!(
                checked_shipment_lines = report.checked_shipment_lines,
                checked_appointments = report.checked_appointments,
                capacity_drifts = report.capacity_drifts.len(),
                aggregate_drifts = report.aggregate_drifts.len(),
                over_committed = report.over_committed.len(),
                repaired = report.repaired,
                "对账完成"
            );
            Ok(report)
        })
    }
}
