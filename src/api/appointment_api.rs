// ==========================================
// 物流托盘预约系统 - 预约（整单）API
// ==========================================
// 职责: 整单删除 / 批量删除预约，查询预约
// 红线: 批量删除逐个独立事务，返回成功数
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::post_commit::PostCommitHooks;
use crate::api::reservation_api::{actor_of, event_of, require_id};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::appointment::Appointment;
use crate::engine::cascade::{BatchDeleteFailure, CascadeOutcome, CascadeService};
use crate::engine::events::BookingEventType;
use crate::repository::AppointmentRepository;

/// 批量删除响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDeleteResponse {
    pub success_count: usize,
    pub deleted_appointment_ids: Vec<String>,
    pub failures: Vec<BatchDeleteFailure>,
}

// ==========================================
// AppointmentApi - 预约 API
// ==========================================
pub struct AppointmentApi {
    cascade: Arc<CascadeService>,
    appointment_repo: Arc<AppointmentRepository>,
    hooks: PostCommitHooks,
}

impl AppointmentApi {
    pub(crate) fn new(
        cascade: Arc<CascadeService>,
        appointment_repo: Arc<AppointmentRepository>,
        hooks: PostCommitHooks,
    ) -> Self {
        Self {
            cascade,
            appointment_repo,
            hooks,
        }
    }

    /// 查询预约
    pub fn get_appointment(&self, appointment_id: &str) -> ApiResult<Appointment> {
        require_id("appointment_id", appointment_id)?;
        self.appointment_repo
            .find_by_id(appointment_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Appointment(id={})不存在", appointment_id)))
    }

    /// 整单删除预约（明细、下游调度记录一并删除，容量回补）
    pub fn delete_appointment(&self, appointment_id: &str, operator: &str) -> ApiResult<CascadeOutcome> {
        require_id("appointment_id", appointment_id)?;
        let actor = actor_of(operator);

        let outcome = self.cascade.delete_appointment(appointment_id, actor)?;
        self.record_deleted(&outcome, actor);

        Ok(outcome)
    }

    /// 批量删除预约
    ///
    /// 单个预约失败不影响其他预约；空 ID 记为失败
    pub fn batch_delete_appointments(
        &self,
        appointment_ids: &[String],
        operator: &str,
    ) -> ApiResult<BatchDeleteResponse> {
        if appointment_ids.is_empty() {
            return Err(ApiError::InvalidInput("批量删除列表不能为空".to_string()));
        }
        let actor = actor_of(operator);

        let (valid, blank): (Vec<String>, Vec<String>) = appointment_ids
            .iter()
            .cloned()
            .partition(|id| !id.trim().is_empty());

        let outcome = self.cascade.batch_delete(&valid, actor);
        for deleted in &outcome.deleted {
            self.record_deleted(deleted, actor);
        }

        let mut failures = outcome.failed.clone();
        failures.extend(blank.into_iter().map(|id| BatchDeleteFailure {
            appointment_id: id,
            reason: "appointment_id 不能为空".to_string(),
        }));

        Ok(BatchDeleteResponse {
            success_count: outcome.success_count(),
            deleted_appointment_ids: outcome.deleted.iter().map(|d| d.appointment_id.clone()).collect(),
            failures,
        })
    }

    fn record_deleted(&self, outcome: &CascadeOutcome, actor: &str) {
        let log = ActionLog::now(ActionType::DeleteAppointment, actor)
            .with_appointment(&outcome.appointment_id)
            .with_payload(json!({
                "removed_reservations": outcome.removed_reservations,
                "removed_dispatch_tasks": outcome.removed_dispatch_tasks,
                "shipment_line_ids": outcome.shipment_line_ids,
            }));
        let event = event_of(
            BookingEventType::AppointmentDeleted,
            std::slice::from_ref(&outcome.appointment_id),
            &outcome.shipment_line_ids,
        );
        self.hooks.record(log, Some(event));
    }
}
