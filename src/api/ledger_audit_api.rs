// ==========================================
// 物流托盘预约系统 - 账本对账 API
// ==========================================

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::post_commit::PostCommitHooks;
use crate::api::reservation_api::{actor_of, event_of, require_id};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::engine::events::BookingEventType;
use crate::engine::reconcile::{ReconcileReport, ReconcileService};
use crate::repository::action_log_repo::ActionLogRepository;

/// 最近日志查询的条数上限
pub const MAX_RECENT_ACTION_LOGS: i32 = 500;

pub struct LedgerAuditApi {
    reconcile: Arc<ReconcileService>,
    action_log_repo: Arc<ActionLogRepository>,
    hooks: PostCommitHooks,
}

impl LedgerAuditApi {
    pub(crate) fn new(
        reconcile: Arc<ReconcileService>,
        action_log_repo: Arc<ActionLogRepository>,
        hooks: PostCommitHooks,
    ) -> Self {
        Self {
            reconcile,
            action_log_repo,
            hooks,
        }
    }

    // ==========================================
    // 操作日志查询
    // ==========================================

    /// 查询预约的操作日志（新→旧）
    ///
    /// 预约删除后日志仍保留，因此不校验预约是否存在
    pub fn list_appointment_action_logs(&self, appointment_id: &str) -> ApiResult<Vec<ActionLog>> {
        require_id("appointment_id", appointment_id)?;
        Ok(self.action_log_repo.find_by_appointment(appointment_id)?)
    }

    /// 查询时间范围内的操作日志（闭区间，新→旧）
    pub fn list_action_logs_in_range(
        &self,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> ApiResult<Vec<ActionLog>> {
        if start_time > end_time {
            return Err(ApiError::InvalidInput(format!(
                "开始时间 {} 晚于结束时间 {}",
                start_time, end_time
            )));
        }
        Ok(self.action_log_repo.find_by_time_range(start_time, end_time)?)
    }

    /// 查询最近 `limit` 条操作日志
    pub fn list_recent_action_logs(&self, limit: i32) -> ApiResult<Vec<ActionLog>> {
        if !(1..=MAX_RECENT_ACTION_LOGS).contains(&limit) {
            return Err(ApiError::InvalidInput(format!(
                "limit 必须在 1..={} 之间: {}",
                MAX_RECENT_ACTION_LOGS, limit
            )));
        }
        Ok(self.action_log_repo.find_recent(limit)?)
    }

    /// 全量对账；repair=true 时按账本修复派生计数器
    pub fn reconcile_ledger(&self, repair: bool, operator: &str) -> ApiResult<ReconcileReport> {
        let actor = actor_of(operator);
        let report = self.reconcile.run(repair, actor)?;

        let log = ActionLog::now(ActionType::ReconcileLedger, actor)
            .with_payload(json!({
                "repair": repair,
                "checked_shipment_lines": report.checked_shipment_lines,
                "checked_appointments": report.checked_appointments,
                "capacity_drifts": report.capacity_drifts.len(),
                "aggregate_drifts": report.aggregate_drifts.len(),
                "over_committed": report.over_committed.len(),
            }))
            .with_detail(if report.is_consistent() {
                "账本一致".to_string()
            } else if report.repaired {
                "发现偏差，已按账本修复".to_string()
            } else {
                "发现偏差，未修复".to_string()
            });

        let event = report.repaired.then(|| {
            let appointment_ids: Vec<String> = report
                .aggregate_drifts
                .iter()
                .map(|d| d.appointment_id.clone())
                .collect();
            let shipment_line_ids: Vec<String> = report
                .capacity_drifts
                .iter()
                .map(|d| d.shipment_line_id.clone())
                .collect();
            event_of(BookingEventType::LedgerReconciled, &appointment_ids, &shipment_line_ids)
        });
        self.hooks.record(log, event);

        Ok(report)
    }
}
