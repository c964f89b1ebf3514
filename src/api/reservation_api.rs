// ==========================================
// 物流托盘预约系统 - 预约明细 API
// ==========================================
// 职责: 入参校验 → 调用 BookingLedger → 提交后写日志、发事件
// 约定: 调用方已完成鉴权，operator 为不透明的用户标识
// ==========================================

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::post_commit::PostCommitHooks;
use crate::config::BookingConfigReader;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::appointment::ReservationLine;
use crate::engine::booking::{BatchReservationItem, BookingLedger};
use crate::engine::error::BookingError;
use crate::engine::events::{BookingEvent, BookingEventType};
use crate::engine::recalc::{CapacityStatus, RecalcOutcome, RecalcService};
use crate::engine::transaction::TransactionCoordinator;
use crate::repository::{AppointmentRepository, ReservationLineRepository};

// ==========================================
// ReservationApi - 预约明细 API
// ==========================================
pub struct ReservationApi {
    ledger: Arc<BookingLedger>,
    coordinator: TransactionCoordinator,
    reservation_repo: Arc<ReservationLineRepository>,
    appointment_repo: Arc<AppointmentRepository>,
    config: Arc<dyn BookingConfigReader>,
    hooks: PostCommitHooks,
}

impl ReservationApi {
    pub(crate) fn new(
        ledger: Arc<BookingLedger>,
        coordinator: TransactionCoordinator,
        reservation_repo: Arc<ReservationLineRepository>,
        appointment_repo: Arc<AppointmentRepository>,
        config: Arc<dyn BookingConfigReader>,
        hooks: PostCommitHooks,
    ) -> Self {
        Self {
            ledger,
            coordinator,
            reservation_repo,
            appointment_repo,
            config,
            hooks,
        }
    }

    // ==========================================
    // 写操作
    // ==========================================

    /// 新建预约明细
    pub fn create_reservation(
        &self,
        appointment_id: &str,
        shipment_line_id: &str,
        reserved_units: i64,
        operator: &str,
    ) -> ApiResult<ReservationLine> {
        require_id("appointment_id", appointment_id)?;
        require_id("shipment_line_id", shipment_line_id)?;
        require_non_negative("reserved_units", reserved_units)?;
        let actor = actor_of(operator);

        let outcome = self
            .ledger
            .create(appointment_id, shipment_line_id, reserved_units, actor)?;

        let log = ActionLog::now(ActionType::CreateReservation, actor)
            .with_appointment(appointment_id)
            .with_payload(json!({
                "reservation_id": outcome.result.reservation_id,
                "shipment_line_id": shipment_line_id,
                "reserved_units": reserved_units,
                "capacity_snapshot": outcome.result.capacity_snapshot,
            }));
        self.hooks.record(
            log,
            Some(event_of(BookingEventType::ReservationCreated, &outcome.appointment_ids, &outcome.shipment_line_ids)),
        );

        Ok(outcome.result)
    }

    /// 修改预约托数 / 拒收托数（均为可选）
    pub fn update_reservation(
        &self,
        reservation_id: &str,
        reserved_units: Option<i64>,
        rejected_units: Option<i64>,
        operator: &str,
    ) -> ApiResult<ReservationLine> {
        require_id("reservation_id", reservation_id)?;
        if let Some(v) = reserved_units {
            require_non_negative("reserved_units", v)?;
        }
        if let Some(v) = rejected_units {
            require_non_negative("rejected_units", v)?;
        }
        let actor = actor_of(operator);

        let outcome = self
            .ledger
            .update(reservation_id, reserved_units, rejected_units, actor)?;

        if reserved_units.is_none() && rejected_units.is_none() {
            return Ok(outcome.result);
        }

        let log = ActionLog::now(ActionType::UpdateReservation, actor)
            .with_appointment(&outcome.result.appointment_id)
            .with_payload(json!({
                "reservation_id": reservation_id,
                "reserved_units": reserved_units,
                "rejected_units": rejected_units,
            }));
        self.hooks.record(
            log,
            Some(event_of(BookingEventType::ReservationUpdated, &outcome.appointment_ids, &outcome.shipment_line_ids)),
        );

        Ok(outcome.result)
    }

    /// 删除预约明细，返回被删除的明细
    pub fn delete_reservation(&self, reservation_id: &str, operator: &str) -> ApiResult<ReservationLine> {
        require_id("reservation_id", reservation_id)?;
        let actor = actor_of(operator);

        let outcome = self.ledger.delete(reservation_id, actor)?;

        let log = ActionLog::now(ActionType::DeleteReservation, actor)
            .with_appointment(&outcome.result.appointment_id)
            .with_payload(json!({
                "reservation_id": reservation_id,
                "shipment_line_id": outcome.result.shipment_line_id,
                "reserved_units": outcome.result.reserved_units,
                "rejected_units": outcome.result.rejected_units,
            }));
        self.hooks.record(
            log,
            Some(event_of(BookingEventType::ReservationDeleted, &outcome.appointment_ids, &outcome.shipment_line_ids)),
        );

        Ok(outcome.result)
    }

    /// 批量新建（全部成功或整体失败）
    pub fn batch_create_reservations(
        &self,
        appointment_id: &str,
        items: &[BatchReservationItem],
        operator: &str,
    ) -> ApiResult<Vec<ReservationLine>> {
        require_id("appointment_id", appointment_id)?;
        if items.is_empty() {
            return Err(ApiError::InvalidInput("批量新建列表不能为空".to_string()));
        }

        let max_items = self
            .config
            .get_batch_create_max_items()
            .map_err(|e| ApiError::InternalError(format!("读取批量上限失败: {}", e)))?;
        if items.len() > max_items {
            return Err(ApiError::BatchLimitExceeded {
                count: items.len(),
                max: max_items,
            });
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for item in items {
            require_id("shipment_line_id", &item.shipment_line_id)?;
            require_non_negative("reserved_units", item.reserved_units)?;
            if !seen.insert(item.shipment_line_id.as_str()) {
                return Err(ApiError::DuplicateReservation {
                    appointment_id: appointment_id.to_string(),
                    shipment_line_id: item.shipment_line_id.clone(),
                });
            }
        }
        let actor = actor_of(operator);

        let outcome = self
            .ledger
            .batch_create(appointment_id, items, max_items, actor)?;

        let batch_total: i64 = items.iter().map(|i| i.reserved_units).sum();
        let log = ActionLog::now(ActionType::BatchCreateReservations, actor)
            .with_appointment(appointment_id)
            .with_payload(json!({
                "item_count": items.len(),
                "batch_total": batch_total,
                "reservation_ids": outcome.result.iter().map(|l| &l.reservation_id).collect::<Vec<_>>(),
            }))
            .with_detail(format!("批量新建{}条预约明细，共{}托", items.len(), batch_total));
        self.hooks.record(
            log,
            Some(event_of(
                BookingEventType::ReservationsBatchCreated,
                &outcome.appointment_ids,
                &outcome.shipment_line_ids,
            )),
        );

        Ok(outcome.result)
    }

    /// 批量转移到目标预约（全部成功或整体失败）
    pub fn batch_move_reservations(
        &self,
        reservation_ids: &[String],
        target_appointment_id: &str,
        operator: &str,
    ) -> ApiResult<Vec<ReservationLine>> {
        require_id("target_appointment_id", target_appointment_id)?;
        if reservation_ids.is_empty() {
            return Err(ApiError::InvalidInput("批量转移列表不能为空".to_string()));
        }
        for id in reservation_ids {
            require_id("reservation_id", id)?;
        }

        let max_items = self
            .config
            .get_batch_move_max_items()
            .map_err(|e| ApiError::InternalError(format!("读取批量上限失败: {}", e)))?;
        let actor = actor_of(operator);

        let outcome = self
            .ledger
            .batch_move(reservation_ids, target_appointment_id, max_items, actor)?;

        let moved_total: i64 = outcome.result.iter().map(|l| l.reserved_units).sum();
        let log = ActionLog::now(ActionType::BatchMoveReservations, actor)
            .with_appointment(target_appointment_id)
            .with_payload(json!({
                "source_appointment_id": outcome.appointment_ids.first(),
                "target_appointment_id": target_appointment_id,
                "reservation_ids": reservation_ids,
                "moved_total": moved_total,
            }))
            .with_detail(format!("转移{}条预约明细，共{}托", reservation_ids.len(), moved_total));
        self.hooks.record(
            log,
            Some(event_of(BookingEventType::ReservationsMoved, &outcome.appointment_ids, &outcome.shipment_line_ids)),
        );

        Ok(outcome.result)
    }

    /// 人工触发单个订单明细的可用量重算
    pub fn recalculate_shipment_line(&self, shipment_line_id: &str, operator: &str) -> ApiResult<RecalcOutcome> {
        require_id("shipment_line_id", shipment_line_id)?;
        let actor = actor_of(operator);

        let outcome = self.coordinator.run("recalculate_shipment_line", |tx| {
            RecalcService::recalc_tx(tx, shipment_line_id)
        })?;

        let log = ActionLog::now(ActionType::RecalculateCapacity, actor).with_payload(json!({
            "shipment_line_id": shipment_line_id,
            "previous_available": outcome.previous_available,
            "available_units": outcome.available_units,
        }));
        let event = outcome.changed().then(|| {
            event_of(
                BookingEventType::CapacityRecalculated,
                &[],
                &[shipment_line_id.to_string()],
            )
        });
        self.hooks.record(log, event);

        Ok(outcome)
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 查询单条预约明细
    pub fn get_reservation(&self, reservation_id: &str) -> ApiResult<ReservationLine> {
        require_id("reservation_id", reservation_id)?;
        self.reservation_repo
            .find_by_id(reservation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("ReservationLine(id={})不存在", reservation_id)))
    }

    /// 查询预约下的全部明细
    pub fn list_appointment_reservations(&self, appointment_id: &str) -> ApiResult<Vec<ReservationLine>> {
        require_id("appointment_id", appointment_id)?;
        if self.appointment_repo.find_by_id(appointment_id)?.is_none() {
            return Err(ApiError::NotFound(format!("Appointment(id={})不存在", appointment_id)));
        }
        Ok(self.reservation_repo.find_by_appointment(appointment_id)?)
    }

    /// 查询订单明细的容量状态
    pub fn get_capacity_status(&self, shipment_line_id: &str) -> ApiResult<CapacityStatus> {
        require_id("shipment_line_id", shipment_line_id)?;
        let status = self
            .coordinator
            .read("get_capacity_status", |tx| -> Result<CapacityStatus, BookingError> {
                RecalcService::inspect_tx(tx, shipment_line_id)
            })?;
        Ok(status)
    }
}

// ==========================================
// 入参校验
// ==========================================

pub(crate) fn require_id(field: &str, value: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidInput(format!("{} 不能为空", field)));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i64) -> ApiResult<()> {
    if value < 0 {
        return Err(ApiError::InvalidInput(format!("{} 不能为负数: {}", field, value)));
    }
    Ok(())
}

pub(crate) fn actor_of(operator: &str) -> &str {
    let trimmed = operator.trim();
    if trimmed.is_empty() {
        "system"
    } else {
        trimmed
    }
}

pub(crate) fn event_of(
    event_type: BookingEventType,
    appointment_ids: &[String],
    shipment_line_ids: &[String],
) -> BookingEvent {
    BookingEvent::new(
        event_type,
        appointment_ids.to_vec(),
        shipment_line_ids.to_vec(),
        Some("ReservationApi".to_string()),
    )
}
