// ==========================================
// 物流托盘预约系统 - 整单删除预约（级联）
// ==========================================
// 顺序: 回补容量 → 删除下游调度记录 → 删除明细 → 删除预约 → 重算兜底
// 红线: 单个预约的删除在一个事务内完成
// 红线: 批量删除时每个预约独立事务，失败不阻塞其他预约
// ==========================================

use crate::engine::booking::distinct;
use crate::engine::capacity_resolver::CapacitySourceResolver;
use crate::engine::error::{BookingError, BookingResult};
use crate::engine::recalc::{RecalcOutcome, RecalcService};
use crate::engine::transaction::TransactionCoordinator;
use crate::repository::{AppointmentRepository, DispatchTaskRepository, ReservationLineRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// 单个预约删除结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeOutcome {
    pub appointment_id: String,
    pub removed_reservations: usize,
    pub removed_dispatch_tasks: usize,
    pub shipment_line_ids: Vec<String>,
    pub recalcs: Vec<RecalcOutcome>,
}

/// 批量删除结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<CascadeOutcome>,
    pub failed: Vec<BatchDeleteFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeleteFailure {
    pub appointment_id: String,
    pub reason: String,
}

impl BatchDeleteOutcome {
    pub fn success_count(&self) -> usize {
        self.deleted.len()
    }
}

// ==========================================
// CascadeService - 级联删除服务
// ==========================================
pub struct CascadeService {
    coordinator: TransactionCoordinator,
}

impl CascadeService {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self { coordinator }
    }

    /// 删除预约及其全部明细与下游记录
    ///
    /// 每条明细按 reserved_units 回补到当前权威来源，
    /// 删除完成后再按账本重算受影响的订单明细（有拒收时以重算结果为准）
    #[instrument(skip(self))]
    pub fn delete_appointment(&self, appointment_id: &str, actor: &str) -> BookingResult<CascadeOutcome> {
        self.coordinator.run("delete_appointment", |tx| {
            AppointmentRepository::require_tx(tx, appointment_id)?;

            let lines = ReservationLineRepository::find_by_appointment_tx(tx, appointment_id)?;
            for line in &lines {
                let source = CapacitySourceResolver::resolve_tx(tx, &line.shipment_line_id)?;
                CapacitySourceResolver::credit_available_tx(tx, &source, line.reserved_units)?;
            }

            let removed_dispatch_tasks = DispatchTaskRepository::delete_by_appointment_tx(tx, appointment_id)?;
            let removed_reservations = ReservationLineRepository::delete_by_appointment_tx(tx, appointment_id)?;
            if AppointmentRepository::delete_tx(tx, appointment_id)? == 0 {
                return Err(BookingError::not_found("Appointment", appointment_id));
            }

            let shipment_line_ids = distinct(lines.iter().map(|l| l.shipment_line_id.as_str()));
            let recalcs = RecalcService::recalc_many_tx(tx, shipment_line_ids.iter().map(String::as_str))?;

            let corrected = recalcs.iter().filter(|r| r.changed()).count();
            if corrected > 0 {
                warn!(corrected, "毛量回补与账本重算不一致，已按重算结果修正");
            }

            info!(
                removed_reservations,
                removed_dispatch_tasks,
                actor,
                "预约已整单删除"
            );

            Ok(CascadeOutcome {
                appointment_id: appointment_id.to_string(),
                removed_reservations,
                removed_dispatch_tasks,
                shipment_line_ids,
                recalcs,
            })
        })
    }

    /// 批量删除预约
    ///
    /// 逐个独立删除，返回成功列表与失败原因
    #[instrument(skip(self, appointment_ids), fields(count = appointment_ids.len()))]
    pub fn batch_delete(&self, appointment_ids: &[String], actor: &str) -> BatchDeleteOutcome {
        let mut outcome = BatchDeleteOutcome::default();

        for appointment_id in appointment_ids {
            match self.delete_appointment(appointment_id, actor) {
                Ok(deleted) => outcome.deleted.push(deleted),
                Err(e) => {
                    warn!(appointment_id = %appointment_id, error = %e, "预约删除失败，继续处理其余预约");
                    outcome.failed.push(BatchDeleteFailure {
                        appointment_id: appointment_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = outcome.success_count(),
            failed = outcome.failed.len(),
            "批量删除预约完成"
        );
        outcome
    }
}
