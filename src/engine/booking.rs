// ==========================================
// 物流托盘预约系统 - 预约账本
// ==========================================
// 红线: 账本（reservation_line）唯一写入者
// 红线: 每个操作一个事务；校验全部先于写入；任一失败整笔回滚
// 红线: 账本写入 → 重算可用量 → 调整预约计划托数，同事务完成
// ==========================================
// 流程: 加写锁 → 读账本 → 解析容量来源 → 校验上限 → 写账本
//       → RecalcService → AppointmentAggregate → 提交
// ==========================================

use crate::domain::appointment::ReservationLine;
use crate::domain::capacity::CapacityAccount;
use crate::engine::aggregate::AppointmentAggregate;
use crate::engine::capacity_resolver::CapacitySourceResolver;
use crate::engine::error::{BookingError, BookingResult};
use crate::engine::recalc::{RecalcOutcome, RecalcService};
use crate::engine::transaction::TransactionCoordinator;
use crate::repository::{now_ts, AppointmentRepository, ReservationLineRepository};
use rusqlite::Transaction;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// 批量新建条数硬上限
pub const MAX_BATCH_CREATE_ITEMS: usize = 50;

// ==========================================
// 输入 / 输出
// ==========================================

/// 批量新建的单条输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReservationItem {
    pub shipment_line_id: String,
    pub reserved_units: i64,
}

/// 账本变更结果
///
/// 携带受影响范围，供提交后写日志、发事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerOutcome<T> {
    pub result: T,
    pub appointment_ids: Vec<String>,
    pub shipment_line_ids: Vec<String>,
    pub recalcs: Vec<RecalcOutcome>,
}

// ==========================================
// BookingLedger - 预约账本
// ==========================================
pub struct BookingLedger {
    coordinator: TransactionCoordinator,
}

impl BookingLedger {
    pub fn new(coordinator: TransactionCoordinator) -> Self {
        Self { coordinator }
    }

    // ==========================================
    // 新建
    // ==========================================

    /// 新建一条预约明细
    ///
    /// # 错误
    /// - NotFound: 预约或订单明细不存在
    /// - DuplicateReservation: 该 (预约, 订单明细) 已有明细
    /// - CapacityExceeded: 超出可预约上限
    #[instrument(skip(self))]
    pub fn create(
        &self,
        appointment_id: &str,
        shipment_line_id: &str,
        reserved_units: i64,
        actor: &str,
    ) -> BookingResult<LedgerOutcome<ReservationLine>> {
        ensure_non_negative("reserved_units", reserved_units)?;

        self.coordinator.run("create_reservation", |tx| {
            AppointmentRepository::require_tx(tx, appointment_id)?;

            let line = Self::insert_line_tx(tx, appointment_id, shipment_line_id, reserved_units, actor)?;
            let recalc = RecalcService::recalc_tx(tx, shipment_line_id)?;
            AppointmentAggregate::apply_delta_tx(tx, appointment_id, reserved_units, actor)?;

            info!(
                reservation_id = %line.reservation_id,
                available = recalc.available_units,
                "预约明细已新建"
            );

            Ok(LedgerOutcome {
                appointment_ids: vec![appointment_id.to_string()],
                shipment_line_ids: vec![shipment_line_id.to_string()],
                recalcs: vec![recalc],
                result: line,
            })
        })
    }

    /// 批量新建（同一预约，顺序处理，全部成功或全部失败）
    ///
    /// 第 k 条校验时能看到第 1..k-1 条已写入的占用
    #[instrument(skip(self, items), fields(item_count = items.len()))]
    pub fn batch_create(
        &self,
        appointment_id: &str,
        items: &[BatchReservationItem],
        max_items: usize,
        actor: &str,
    ) -> BookingResult<LedgerOutcome<Vec<ReservationLine>>> {
        let max_items = max_items.min(MAX_BATCH_CREATE_ITEMS);
        if items.is_empty() {
            return Err(BookingError::InvalidInput("批量新建列表为空".to_string()));
        }
        if items.len() > max_items {
            return Err(BookingError::BatchLimitExceeded {
                count: items.len(),
                max: max_items,
            });
        }
        for item in items {
            ensure_non_negative("reserved_units", item.reserved_units)?;
        }

        self.coordinator.run("batch_create_reservations", |tx| {
            AppointmentRepository::require_tx(tx, appointment_id)?;

            let mut lines = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let line = Self::insert_line_tx(
                    tx,
                    appointment_id,
                    &item.shipment_line_id,
                    item.reserved_units,
                    actor,
                )
                .map_err(|e| {
                    warn!(index, shipment_line_id = %item.shipment_line_id, error = %e, "批量新建失败，整批回滚");
                    e
                })?;
                lines.push(line);
            }

            let shipment_line_ids = distinct(items.iter().map(|i| i.shipment_line_id.as_str()));
            let recalcs = RecalcService::recalc_many_tx(tx, shipment_line_ids.iter().map(String::as_str))?;

            let batch_total: i64 = items.iter().map(|i| i.reserved_units).sum();
            AppointmentAggregate::apply_delta_tx(tx, appointment_id, batch_total, actor)?;

            info!(created = lines.len(), batch_total, "批量新建完成");

            Ok(LedgerOutcome {
                appointment_ids: vec![appointment_id.to_string()],
                shipment_line_ids,
                recalcs,
                result: lines,
            })
        })
    }

    // ==========================================
    // 修改
    // ==========================================

    /// 修改预约托数和/或拒收托数
    ///
    /// - 两者都不传: 不写库，返回当前明细
    /// - 拒收变化不影响预约计划托数
    /// - 只要传了任一字段，新的预约托数都要按其他明细的净占用重新校验上限
    #[instrument(skip(self))]
    pub fn update(
        &self,
        reservation_id: &str,
        reserved_units: Option<i64>,
        rejected_units: Option<i64>,
        actor: &str,
    ) -> BookingResult<LedgerOutcome<ReservationLine>> {
        if let Some(v) = reserved_units {
            ensure_non_negative("reserved_units", v)?;
        }
        if let Some(v) = rejected_units {
            ensure_non_negative("rejected_units", v)?;
        }

        self.coordinator.run("update_reservation", |tx| {
            let existing = ReservationLineRepository::find_tx(tx, reservation_id)?
                .ok_or_else(|| BookingError::not_found("ReservationLine", reservation_id))?;

            if reserved_units.is_none() && rejected_units.is_none() {
                return Ok(LedgerOutcome {
                    appointment_ids: vec![existing.appointment_id.clone()],
                    shipment_line_ids: vec![existing.shipment_line_id.clone()],
                    recalcs: Vec::new(),
                    result: existing,
                });
            }

            let new_reserved = reserved_units.unwrap_or(existing.reserved_units);
            let new_rejected = rejected_units.unwrap_or(existing.rejected_units);

            if new_rejected > new_reserved {
                return Err(BookingError::InvalidRejection {
                    reserved_units: new_reserved,
                    rejected_units: new_rejected,
                });
            }

            // 自身原占用不计入其他占用，拒收变化同样要落在上限内
            let source = CapacitySourceResolver::resolve_tx(tx, &existing.shipment_line_id)?;
            let other_effective = ReservationLineRepository::sum_effective_tx(
                tx,
                &existing.shipment_line_id,
                Some(reservation_id),
            )?;
            let max_allowed = source.max_allowed(other_effective);
            if new_reserved > max_allowed {
                return Err(BookingError::CapacityExceeded {
                    shipment_line_id: existing.shipment_line_id.clone(),
                    requested: new_reserved,
                    max_allowed,
                });
            }

            ReservationLineRepository::update_units_tx(tx, reservation_id, new_reserved, new_rejected, actor)?;
            let recalc = RecalcService::recalc_tx(tx, &existing.shipment_line_id)?;
            AppointmentAggregate::apply_delta_tx(
                tx,
                &existing.appointment_id,
                new_reserved - existing.reserved_units,
                actor,
            )?;

            let updated = ReservationLineRepository::find_tx(tx, reservation_id)?
                .ok_or_else(|| BookingError::not_found("ReservationLine", reservation_id))?;

            info!(
                reserved = updated.reserved_units,
                rejected = updated.rejected_units,
                available = recalc.available_units,
                "预约明细已修改"
            );

            Ok(LedgerOutcome {
                appointment_ids: vec![updated.appointment_id.clone()],
                shipment_line_ids: vec![updated.shipment_line_id.clone()],
                recalcs: vec![recalc],
                result: updated,
            })
        })
    }

    // ==========================================
    // 删除
    // ==========================================

    /// 删除一条预约明细（不做容量校验）
    #[instrument(skip(self))]
    pub fn delete(&self, reservation_id: &str, actor: &str) -> BookingResult<LedgerOutcome<ReservationLine>> {
        self.coordinator.run("delete_reservation", |tx| {
            let existing = ReservationLineRepository::find_tx(tx, reservation_id)?
                .ok_or_else(|| BookingError::not_found("ReservationLine", reservation_id))?;

            ReservationLineRepository::delete_tx(tx, reservation_id)?;
            let recalc = RecalcService::recalc_tx(tx, &existing.shipment_line_id)?;
            AppointmentAggregate::apply_delta_tx(tx, &existing.appointment_id, -existing.reserved_units, actor)?;

            info!(available = recalc.available_units, "预约明细已删除");

            Ok(LedgerOutcome {
                appointment_ids: vec![existing.appointment_id.clone()],
                shipment_line_ids: vec![existing.shipment_line_id.clone()],
                recalcs: vec![recalc],
                result: existing,
            })
        })
    }

    // ==========================================
    // 批量转移
    // ==========================================

    /// 把同一来源预约下的若干明细转到目标预约
    ///
    /// # 错误
    /// - CrossAppointmentMismatch: 明细来自多个预约，或目标即来源
    /// - DuplicateReservation: 目标预约已有同一订单明细的明细
    #[instrument(skip(self, reservation_ids), fields(item_count = reservation_ids.len()))]
    pub fn batch_move(
        &self,
        reservation_ids: &[String],
        target_appointment_id: &str,
        max_items: usize,
        actor: &str,
    ) -> BookingResult<LedgerOutcome<Vec<ReservationLine>>> {
        if reservation_ids.is_empty() {
            return Err(BookingError::InvalidInput("批量转移列表为空".to_string()));
        }
        if reservation_ids.len() > max_items {
            return Err(BookingError::BatchLimitExceeded {
                count: reservation_ids.len(),
                max: max_items,
            });
        }
        let unique_ids = distinct(reservation_ids.iter().map(String::as_str));
        if unique_ids.len() != reservation_ids.len() {
            return Err(BookingError::InvalidInput("批量转移列表包含重复明细".to_string()));
        }

        self.coordinator.run("batch_move_reservations", |tx| {
            AppointmentRepository::require_tx(tx, target_appointment_id)?;

            let mut lines = Vec::with_capacity(reservation_ids.len());
            for id in reservation_ids {
                let line = ReservationLineRepository::find_tx(tx, id)?
                    .ok_or_else(|| BookingError::not_found("ReservationLine", id))?;
                lines.push(line);
            }

            let sources = distinct(lines.iter().map(|l| l.appointment_id.as_str()));
            let source_appointment_id = match sources.as_slice() {
                [single] => single.clone(),
                _ => {
                    return Err(BookingError::CrossAppointmentMismatch(format!(
                        "明细来自多个预约: {:?}",
                        sources
                    )))
                }
            };
            if source_appointment_id == target_appointment_id {
                return Err(BookingError::CrossAppointmentMismatch(format!(
                    "目标预约与来源预约相同: {}",
                    target_appointment_id
                )));
            }

            for line in &lines {
                if ReservationLineRepository::find_by_pair_tx(tx, target_appointment_id, &line.shipment_line_id)?
                    .is_some()
                {
                    return Err(BookingError::DuplicateReservation {
                        appointment_id: target_appointment_id.to_string(),
                        shipment_line_id: line.shipment_line_id.clone(),
                    });
                }
            }

            let mut recalcs = Vec::with_capacity(lines.len());
            for line in &lines {
                ReservationLineRepository::reassign_appointment_tx(
                    tx,
                    &line.reservation_id,
                    target_appointment_id,
                    actor,
                )?;
                recalcs.push(RecalcService::recalc_tx(tx, &line.shipment_line_id)?);
            }

            let moved_total: i64 = lines.iter().map(|l| l.reserved_units).sum();
            AppointmentAggregate::apply_delta_tx(tx, &source_appointment_id, -moved_total, actor)?;
            AppointmentAggregate::apply_delta_tx(tx, target_appointment_id, moved_total, actor)?;

            let mut moved = Vec::with_capacity(lines.len());
            for line in &lines {
                let updated = ReservationLineRepository::find_tx(tx, &line.reservation_id)?
                    .ok_or_else(|| BookingError::not_found("ReservationLine", &line.reservation_id))?;
                moved.push(updated);
            }

            info!(
                source = %source_appointment_id,
                target = target_appointment_id,
                moved = moved.len(),
                moved_total,
                "批量转移完成"
            );

            Ok(LedgerOutcome {
                appointment_ids: vec![source_appointment_id, target_appointment_id.to_string()],
                shipment_line_ids: distinct(lines.iter().map(|l| l.shipment_line_id.as_str())),
                recalcs,
                result: moved,
            })
        })
    }

    // ==========================================
    // 内部工具
    // ==========================================

    /// 校验并插入一条明细（不重算、不调汇总）
    fn insert_line_tx(
        tx: &Transaction,
        appointment_id: &str,
        shipment_line_id: &str,
        requested: i64,
        actor: &str,
    ) -> BookingResult<ReservationLine> {
        if ReservationLineRepository::find_by_pair_tx(tx, appointment_id, shipment_line_id)?.is_some() {
            return Err(BookingError::DuplicateReservation {
                appointment_id: appointment_id.to_string(),
                shipment_line_id: shipment_line_id.to_string(),
            });
        }

        let source = CapacitySourceResolver::resolve_tx(tx, shipment_line_id)?;
        let other_effective = ReservationLineRepository::sum_effective_tx(tx, shipment_line_id, None)?;
        let max_allowed = source.max_allowed(other_effective);

        if requested > max_allowed {
            return Err(BookingError::CapacityExceeded {
                shipment_line_id: shipment_line_id.to_string(),
                requested,
                max_allowed,
            });
        }

        let ts = now_ts();
        let line = ReservationLine {
            reservation_id: uuid::Uuid::new_v4().to_string(),
            appointment_id: appointment_id.to_string(),
            shipment_line_id: shipment_line_id.to_string(),
            reserved_units: requested,
            rejected_units: 0,
            capacity_snapshot: max_allowed,
            created_at: ts,
            created_by: Some(actor.to_string()),
            updated_at: ts,
            updated_by: Some(actor.to_string()),
        };
        ReservationLineRepository::insert_tx(tx, &line)?;
        Ok(line)
    }
}

fn ensure_non_negative(field: &str, value: i64) -> BookingResult<()> {
    if value < 0 {
        return Err(BookingError::InvalidInput(format!("{} 不能为负数: {}", field, value)));
    }
    Ok(())
}

/// 按首次出现顺序去重
pub(crate) fn distinct<'a, I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out: Vec<String> = Vec::new();
    for v in values {
        if !out.iter().any(|seen| seen == v) {
            out.push(v.to_string());
        }
    }
    out
}
