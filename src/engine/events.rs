// ==========================================
// 物流托盘预约系统 - 引擎层事件发布
// ==========================================
// 职责: 定义预约事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，sync 层实现订单汇总适配器
// 红线: 事件在事务提交之后发布，发布失败不回滚账本
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 预约事件类型
// ==========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingEventType {
    /// 新建预约明细
    ReservationCreated,
    /// 修改预约/拒收托数
    ReservationUpdated,
    /// 删除预约明细
    ReservationDeleted,
    /// 批量新建
    ReservationsBatchCreated,
    /// 批量转移到其他预约
    ReservationsMoved,
    /// 整单删除预约
    AppointmentDeleted,
    /// 人工重算
    CapacityRecalculated,
    /// 对账修复
    LedgerReconciled,
}

impl BookingEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            BookingEventType::ReservationCreated => "ReservationCreated",
            BookingEventType::ReservationUpdated => "ReservationUpdated",
            BookingEventType::ReservationDeleted => "ReservationDeleted",
            BookingEventType::ReservationsBatchCreated => "ReservationsBatchCreated",
            BookingEventType::ReservationsMoved => "ReservationsMoved",
            BookingEventType::AppointmentDeleted => "AppointmentDeleted",
            BookingEventType::CapacityRecalculated => "CapacityRecalculated",
            BookingEventType::LedgerReconciled => "LedgerReconciled",
        }
    }
}

/// 预约事件
///
/// 账本变更提交后发布，携带受影响的预约与订单明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEvent {
    /// 事件类型
    pub event_type: BookingEventType,
    /// 受影响的预约
    pub appointment_ids: Vec<String>,
    /// 受影响的订单明细
    pub affected_shipment_lines: Vec<String>,
    /// 事件来源描述
    pub source: Option<String>,
}

impl BookingEvent {
    pub fn new(
        event_type: BookingEventType,
        appointment_ids: Vec<String>,
        affected_shipment_lines: Vec<String>,
        source: Option<String>,
    ) -> Self {
        Self {
            event_type,
            appointment_ids,
            affected_shipment_lines,
            source,
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 预约事件发布者 Trait
///
/// # 实现说明
/// - sync 层的 `OrderSummarySyncPublisher` 实现此 trait
/// - 把受影响订单明细所属订单的汇总重算一遍
pub trait BookingEventPublisher: Send + Sync {
    /// 发布预约事件
    ///
    /// # 返回
    /// - `Ok(receipt)`: 发布回执（实现自定，可为空字符串）
    /// - `Err`: 发布失败
    fn publish(&self, event: BookingEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl BookingEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: BookingEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - event_type={}, appointments={:?}",
            event.event_type.as_str(),
            event.appointment_ids
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
///
/// 简化 Option<Arc<dyn BookingEventPublisher>> 的使用
#[derive(Clone)]
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn BookingEventPublisher>>,
}

impl OptionalEventPublisher {
    /// 创建带发布者的实例
    pub fn with_publisher(publisher: Arc<dyn BookingEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    /// 创建空实例（不发布事件）
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（如果有发布者）
    pub fn publish(&self, event: BookingEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        match &self.inner {
            Some(publisher) => publisher.publish(event),
            None => {
                tracing::debug!(
                    "OptionalEventPublisher: 未配置发布者，跳过事件 - event_type={}",
                    event.event_type.as_str()
                );
                Ok(String::new())
            }
        }
    }

    /// 检查是否配置了发布者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
