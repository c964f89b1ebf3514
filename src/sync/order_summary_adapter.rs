// ==========================================
// 物流托盘预约系统 - 订单汇总同步适配器
// ==========================================
// 职责: 实现 Engine 层定义的 BookingEventPublisher trait
// 说明: 把 BookingEvent 里受影响的订单明细映射到父订单，
//       逐个订单按账本重算 order_booking_summary
// ==========================================

use crate::engine::events::{BookingEvent, BookingEventPublisher};
use crate::repository::{OrderSummaryRepository, ShipmentLineRepository};
use std::error::Error;
use std::sync::Arc;

/// 订单汇总同步发布者
pub struct OrderSummarySyncPublisher {
    shipment_repo: Arc<ShipmentLineRepository>,
    summary_repo: Arc<OrderSummaryRepository>,
}

impl OrderSummarySyncPublisher {
    pub fn new(shipment_repo: Arc<ShipmentLineRepository>, summary_repo: Arc<OrderSummaryRepository>) -> Self {
        Self {
            shipment_repo,
            summary_repo,
        }
    }
}

impl BookingEventPublisher for OrderSummarySyncPublisher {
    fn publish(&self, event: BookingEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        let order_ids = self
            .shipment_repo
            .order_ids_for_lines(&event.affected_shipment_lines)?;

        for order_id in &order_ids {
            let summary = self.summary_repo.refresh_for_order(order_id)?;
            tracing::debug!(
                order_id = %summary.order_id,
                reserved_units = summary.reserved_units,
                effective_units = summary.effective_units,
                "订单预约汇总已同步"
            );
        }

        tracing::info!(
            "OrderSummarySyncPublisher: 事件已同步 - event_type={}, orders={}",
            event.event_type.as_str(),
            order_ids.len()
        );
        Ok(order_ids.join(","))
    }
}
