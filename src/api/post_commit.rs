// ==========================================
// 物流托盘预约系统 - 提交后处理
// ==========================================
// 红线: 只在账本事务提交后调用
// 红线: 日志写入 / 事件发布失败只记 warn，不影响已提交的结果
// ==========================================

use crate::config::BookingConfigReader;
use crate::domain::action_log::ActionLog;
use crate::engine::events::{BookingEvent, OptionalEventPublisher};
use crate::repository::ActionLogRepository;
use std::sync::Arc;

pub(crate) struct PostCommitHooks {
    action_log_repo: Arc<ActionLogRepository>,
    config: Arc<dyn BookingConfigReader>,
    event_publisher: OptionalEventPublisher,
}

impl PostCommitHooks {
    pub(crate) fn new(
        action_log_repo: Arc<ActionLogRepository>,
        config: Arc<dyn BookingConfigReader>,
        event_publisher: OptionalEventPublisher,
    ) -> Self {
        Self {
            action_log_repo,
            config,
            event_publisher,
        }
    }

    /// 写操作日志并发布事件
    pub(crate) fn record(&self, log: ActionLog, event: Option<BookingEvent>) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(action_type = %log.action_type, "记录操作日志失败: {}", e);
        }

        let Some(event) = event else {
            return;
        };

        let sync_enabled = self.config.is_order_summary_sync_enabled().unwrap_or_else(|e| {
            tracing::warn!("读取同步开关失败，按开启处理: {}", e);
            true
        });
        if !sync_enabled {
            tracing::debug!(event_type = event.event_type.as_str(), "订单汇总同步已关闭，跳过事件");
            return;
        }

        if let Err(e) = self.event_publisher.publish(event) {
            tracing::warn!("发布预约事件失败: {}", e);
        }
    }
}
