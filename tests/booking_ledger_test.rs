// ==========================================
// 预约账本集成测试
// ==========================================
// 职责: 验证新建/修改/删除预约明细时的容量上限、可用量重算、计划托数与审计日志
// ==========================================


#[cfg(test)]
mod booking_ledger_test {
    use pallet_booking::api::ApiError;
    use pallet_booking::config::config_manager::config_keys;
    use pallet_booking::domain::types::CapacitySourceKind;

    use crate::test_helpers::{
        available_of, create_test_state, remaining_units_of, seed_appointment, seed_lot,
        seed_shipment_line, total_units_of,
    };

    // ==========================================
    // 容量上限
    // ==========================================

    #[test]
    fn test_capacity_ceiling_with_rejection_release() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        seed_appointment(&state, "B");
        let api = &state.reservation_api;

        let line_a = api.create_reservation("A", "SL1", 6, "alice").unwrap();
        assert_eq!(line_a.capacity_snapshot, 10);
        assert_eq!(available_of(&state, "SL1"), 4);

        match api.create_reservation("B", "SL1", 5, "bob") {
            Err(ApiError::CapacityExceeded {
                shipment_line_id,
                requested,
                max_allowed,
            }) => {
                assert_eq!(shipment_line_id, "SL1");
                assert_eq!(requested, 5);
                assert_eq!(max_allowed, 4);
            }
            other => panic!("Expected CapacityExceeded, got {:?}", other),
        }
        assert_eq!(available_of(&state, "SL1"), 4);

        // 拒收释放容量，但不改变预约计划托数
        let updated = api
            .update_reservation(&line_a.reservation_id, None, Some(2), "alice")
            .unwrap();
        assert_eq!(updated.reserved_units, 6);
        assert_eq!(updated.rejected_units, 2);
        assert_eq!(available_of(&state, "SL1"), 6);
        assert_eq!(total_units_of(&state, "A"), 6);

        let line_b = api.create_reservation("B", "SL1", 5, "bob").unwrap();
        assert_eq!(line_b.capacity_snapshot, 6);
        assert_eq!(available_of(&state, "SL1"), 1);
        assert_eq!(total_units_of(&state, "B"), 5);
    }

    #[test]
    fn test_update_increase_checked_against_others_only() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        seed_appointment(&state, "B");
        let api = &state.reservation_api;

        api.create_reservation("A", "SL1", 6, "alice").unwrap();
        let line_b = api.create_reservation("B", "SL1", 4, "bob").unwrap();
        assert_eq!(available_of(&state, "SL1"), 0);

        // 自身原占用不计入"其他占用"，上限为 10 - 6 = 4
        let err = api
            .update_reservation(&line_b.reservation_id, Some(5), None, "bob")
            .unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded { max_allowed: 4, .. }));

        api.update_reservation(&line_b.reservation_id, Some(4), None, "bob")
            .unwrap();

        let reduced = api
            .update_reservation(&line_b.reservation_id, Some(3), None, "bob")
            .unwrap();
        assert_eq!(reduced.reserved_units, 3);
        assert_eq!(available_of(&state, "SL1"), 1);
        assert_eq!(total_units_of(&state, "B"), 3);
    }

    #[test]
    fn test_update_rechecks_ceiling_even_without_increase() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        seed_appointment(&state, "B");
        let api = &state.reservation_api;

        // A: 预约 6 拒收 2，B: 预约 5，A 的上限为 10 - 5 = 5
        let line_a = api.create_reservation("A", "SL1", 6, "alice").unwrap();
        api.update_reservation(&line_a.reservation_id, None, Some(2), "alice")
            .unwrap();
        api.create_reservation("B", "SL1", 5, "bob").unwrap();
        assert_eq!(available_of(&state, "SL1"), 1);

        // 只改拒收
        let err = api
            .update_reservation(&line_a.reservation_id, None, Some(3), "alice")
            .unwrap_err();
        match err {
            ApiError::CapacityExceeded {
                shipment_line_id,
                requested,
                max_allowed,
            } => {
                assert_eq!(shipment_line_id, "SL1");
                assert_eq!(requested, 6);
                assert_eq!(max_allowed, 5);
            }
            other => panic!("Expected CapacityExceeded, got {:?}", other),
        }

        // 显式传入原预约托数
        let err = api
            .update_reservation(&line_a.reservation_id, Some(6), Some(3), "alice")
            .unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded { max_allowed: 5, .. }));

        let current = api.get_reservation(&line_a.reservation_id).unwrap();
        assert_eq!(current.reserved_units, 6);
        assert_eq!(current.rejected_units, 2);
        assert_eq!(available_of(&state, "SL1"), 1);
        assert_eq!(total_units_of(&state, "A"), 6);

        // 降到上限以内可以通过
        let reduced = api
            .update_reservation(&line_a.reservation_id, Some(5), Some(3), "alice")
            .unwrap();
        assert_eq!(reduced.reserved_units, 5);
        assert_eq!(available_of(&state, "SL1"), 3);
        assert_eq!(total_units_of(&state, "A"), 5);
    }

    #[test]
    fn test_invalid_rejection_is_rejected_without_side_effects() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        let line = api.create_reservation("A", "SL1", 6, "alice").unwrap();

        let err = api
            .update_reservation(&line.reservation_id, None, Some(7), "alice")
            .unwrap_err();
        match err {
            ApiError::InvalidRejection {
                reserved_units,
                rejected_units,
            } => {
                assert_eq!(reserved_units, 6);
                assert_eq!(rejected_units, 7);
            }
            other => panic!("Expected InvalidRejection, got {:?}", other),
        }

        api.update_reservation(&line.reservation_id, None, Some(2), "alice")
            .unwrap();
        // 把预约托数降到拒收托数以下同样违规
        let err = api
            .update_reservation(&line.reservation_id, Some(1), None, "alice")
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_REJECTION");

        let current = api.get_reservation(&line.reservation_id).unwrap();
        assert_eq!(current.reserved_units, 6);
        assert_eq!(current.rejected_units, 2);
        assert_eq!(available_of(&state, "SL1"), 6);
    }

    #[test]
    fn test_update_without_fields_is_noop() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        let line = api.create_reservation("A", "SL1", 6, "alice").unwrap();
        let unchanged = api
            .update_reservation(&line.reservation_id, None, None, "alice")
            .unwrap();

        assert_eq!(unchanged, line);
        assert_eq!(
            state
                .action_log_repo
                .count_by_action_type("UPDATE_RESERVATION")
                .unwrap(),
            0
        );
    }

    // ==========================================
    // 唯一性与入参
    // ==========================================

    #[test]
    fn test_duplicate_pair_is_rejected() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        api.create_reservation("A", "SL1", 2, "alice").unwrap();
        let err = api.create_reservation("A", "SL1", 1, "alice").unwrap_err();

        assert!(matches!(err, ApiError::DuplicateReservation { .. }));
        assert_eq!(api.list_appointment_reservations("A").unwrap().len(), 1);
        assert_eq!(available_of(&state, "SL1"), 8);
        assert_eq!(total_units_of(&state, "A"), 2);
    }

    #[test]
    fn test_missing_entities_and_bad_input() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        assert!(matches!(
            api.create_reservation("NOPE", "SL1", 1, "alice"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.create_reservation("A", "NOPE", 1, "alice"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.create_reservation("A", "SL1", -1, "alice"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.create_reservation(" ", "SL1", 1, "alice"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.update_reservation("NOPE", Some(1), None, "alice"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.list_appointment_reservations("NOPE"),
            Err(ApiError::NotFound(_))
        ));

        assert_eq!(available_of(&state, "SL1"), 10);
    }

    // ==========================================
    // 删除
    // ==========================================

    #[test]
    fn test_delete_restores_capacity_and_total() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        let line = api.create_reservation("A", "SL1", 6, "alice").unwrap();
        api.update_reservation(&line.reservation_id, None, Some(1), "alice")
            .unwrap();
        assert_eq!(available_of(&state, "SL1"), 5);

        let deleted = api.delete_reservation(&line.reservation_id, "alice").unwrap();
        assert_eq!(deleted.reservation_id, line.reservation_id);
        assert_eq!(deleted.rejected_units, 1);

        assert_eq!(available_of(&state, "SL1"), 10);
        assert_eq!(total_units_of(&state, "A"), 0);
        assert!(matches!(
            api.get_reservation(&line.reservation_id),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.delete_reservation(&line.reservation_id, "alice"),
            Err(ApiError::NotFound(_))
        ));
    }

    // ==========================================
    // 容量来源切换
    // ==========================================

    #[test]
    fn test_counted_lot_becomes_authoritative() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        seed_appointment(&state, "B");
        let api = &state.reservation_api;

        api.create_reservation("A", "SL1", 6, "alice").unwrap();
        assert_eq!(remaining_units_of(&state, "SL1"), 4);

        // 实物到货，实点 8 托
        seed_lot(&state, "LOT1", "SL1", 8, 8);
        let status = api.get_capacity_status("SL1").unwrap();
        assert_eq!(status.source_kind, CapacitySourceKind::PhysicalLot);
        assert_eq!(status.capacity_units, 8);
        assert_eq!(status.expected_available, 2);

        let err = api.create_reservation("B", "SL1", 3, "bob").unwrap_err();
        assert!(matches!(err, ApiError::CapacityExceeded { max_allowed: 2, .. }));

        let line_b = api.create_reservation("B", "SL1", 2, "bob").unwrap();
        assert_eq!(line_b.capacity_snapshot, 2);

        let lot = state.lot_repo.find_by_shipment_line("SL1").unwrap().unwrap();
        assert_eq!(lot.available_units, 0);
        // 非权威来源上的计数器保持不动
        assert_eq!(remaining_units_of(&state, "SL1"), 4);
    }

    #[test]
    fn test_zero_count_lot_keeps_declared_units() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_lot(&state, "LOT1", "SL1", 0, 0);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        api.create_reservation("A", "SL1", 7, "alice").unwrap();

        let status = api.get_capacity_status("SL1").unwrap();
        assert_eq!(status.source_kind, CapacitySourceKind::ShipmentLine);
        assert_eq!(status.stored_available, 3);
        assert_eq!(remaining_units_of(&state, "SL1"), 3);
    }

    // ==========================================
    // 重算
    // ==========================================

    #[test]
    fn test_recalculate_is_idempotent_and_repairs_drift() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        api.create_reservation("A", "SL1", 6, "alice").unwrap();

        {
            let conn = state.conn.lock().unwrap();
            conn.execute(
                "UPDATE shipment_line SET remaining_units = 9 WHERE shipment_line_id = 'SL1'",
                [],
            )
            .unwrap();
        }
        assert!(api.get_capacity_status("SL1").unwrap().is_drifted());

        let first = api.recalculate_shipment_line("SL1", "ops").unwrap();
        assert!(first.changed());
        assert_eq!(first.previous_available, 9);
        assert_eq!(first.available_units, 4);

        let second = api.recalculate_shipment_line("SL1", "ops").unwrap();
        assert!(!second.changed());
        assert_eq!(second.available_units, 4);
        assert!(!api.get_capacity_status("SL1").unwrap().is_drifted());
    }

    // ==========================================
    // 审计日志与订单汇总
    // ==========================================

    #[test]
    fn test_successful_writes_are_logged_failures_are_not() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        let api = &state.reservation_api;

        let line = api.create_reservation("A", "SL1", 6, "alice").unwrap();
        let _ = api.create_reservation("A", "SL1", 1, "alice").unwrap_err();
        api.update_reservation(&line.reservation_id, None, Some(1), "")
            .unwrap();

        let logs = state.action_log_repo.find_by_appointment("A").unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(
            state
                .action_log_repo
                .count_by_action_type("CREATE_RESERVATION")
                .unwrap(),
            1
        );

        let update_log = logs
            .iter()
            .find(|l| l.action_type == "UPDATE_RESERVATION")
            .unwrap();
        assert_eq!(update_log.actor, "system");
        assert_eq!(update_log.payload_json.as_ref().unwrap()["rejected_units"], 1);
    }

    #[test]
    fn test_order_summary_follows_ledger() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_shipment_line(&state, "SL2", "ORD1", 5);
        seed_appointment(&state, "A");
        seed_appointment(&state, "B");
        let api = &state.reservation_api;

        let line = api.create_reservation("A", "SL1", 6, "alice").unwrap();
        api.create_reservation("B", "SL2", 3, "bob").unwrap();
        api.update_reservation(&line.reservation_id, None, Some(2), "alice")
            .unwrap();

        let summary = state.order_summary_repo.find_by_order("ORD1").unwrap().unwrap();
        assert_eq!(summary.line_count, 2);
        assert_eq!(summary.appointment_count, 2);
        assert_eq!(summary.reserved_units, 9);
        assert_eq!(summary.effective_units, 7);
    }

    #[test]
    fn test_order_summary_sync_can_be_disabled() {
        let (_tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_appointment(&state, "A");
        state
            .config_manager
            .set_value(config_keys::ORDER_SUMMARY_SYNC_ENABLED, "false")
            .unwrap();

        state
            .reservation_api
            .create_reservation("A", "SL1", 6, "alice")
            .unwrap();

        assert!(state.order_summary_repo.find_by_order("ORD1").unwrap().is_none());
        // 日志不受同步开关影响
        assert_eq!(
            state
                .action_log_repo
                .count_by_action_type("CREATE_RESERVATION")
                .unwrap(),
            1
        );
    }
}
