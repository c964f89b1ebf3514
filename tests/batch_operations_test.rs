// ==========================================
// 批量操作集成测试
// ==========================================
// 职责: 验证批量新建 / 批量转移的整体原子性、条数上限与一致性校验
// ==========================================


#[cfg(test)]
mod batch_operations_test {
    use pallet_booking::api::ApiError;
    use pallet_booking::app::AppState;
    use pallet_booking::config::config_manager::config_keys;
    use pallet_booking::engine::BatchReservationItem;

    use crate::test_helpers::{
        available_of, create_test_state, seed_appointment, seed_shipment_line, total_units_of,
    };

    fn item(shipment_line_id: &str, reserved_units: i64) -> BatchReservationItem {
        BatchReservationItem {
            shipment_line_id: shipment_line_id.to_string(),
            reserved_units,
        }
    }

    /// SL1=10, SL2=5, SL3=3；预约 A / B 为空
    fn setup() -> (tempfile::NamedTempFile, AppState) {
        let (tmp, state) = create_test_state().unwrap();
        seed_shipment_line(&state, "SL1", "ORD1", 10);
        seed_shipment_line(&state, "SL2", "ORD1", 5);
        seed_shipment_line(&state, "SL3", "ORD2", 3);
        seed_appointment(&state, "A");
        seed_appointment(&state, "B");
        (tmp, state)
    }

    // ==========================================
    // 批量新建
    // ==========================================

    #[test]
    fn test_batch_create_is_all_or_nothing() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        // 第 3 条超出 SL3 容量
        let items = vec![item("SL1", 4), item("SL2", 5), item("SL3", 4)];
        let err = api.batch_create_reservations("A", &items, "alice").unwrap_err();
        assert!(matches!(
            err,
            ApiError::CapacityExceeded { ref shipment_line_id, max_allowed: 3, .. } if shipment_line_id == "SL3"
        ));

        assert!(api.list_appointment_reservations("A").unwrap().is_empty());
        assert_eq!(available_of(&state, "SL1"), 10);
        assert_eq!(available_of(&state, "SL2"), 5);
        assert_eq!(available_of(&state, "SL3"), 3);
        assert_eq!(total_units_of(&state, "A"), 0);
        assert_eq!(
            state
                .action_log_repo
                .count_by_action_type("BATCH_CREATE_RESERVATIONS")
                .unwrap(),
            0
        );

        let items = vec![item("SL1", 4), item("SL2", 5), item("SL3", 3)];
        let lines = api.batch_create_reservations("A", &items, "alice").unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].shipment_line_id, "SL1");
        assert_eq!(lines[2].capacity_snapshot, 3);

        assert_eq!(available_of(&state, "SL1"), 6);
        assert_eq!(available_of(&state, "SL2"), 0);
        assert_eq!(available_of(&state, "SL3"), 0);
        assert_eq!(total_units_of(&state, "A"), 12);
        assert_eq!(
            state
                .action_log_repo
                .count_by_action_type("BATCH_CREATE_RESERVATIONS")
                .unwrap(),
            1
        );
    }

    #[test]
    fn test_batch_create_rejects_existing_pair() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        api.create_reservation("A", "SL1", 2, "alice").unwrap();

        let items = vec![item("SL2", 1), item("SL1", 1)];
        let err = api.batch_create_reservations("A", &items, "alice").unwrap_err();
        assert!(matches!(err, ApiError::DuplicateReservation { .. }));

        assert_eq!(api.list_appointment_reservations("A").unwrap().len(), 1);
        assert_eq!(available_of(&state, "SL2"), 5);
        assert_eq!(total_units_of(&state, "A"), 2);
    }

    #[test]
    fn test_batch_create_rejects_repeated_line_in_request() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        let items = vec![item("SL1", 1), item("SL1", 2)];
        let err = api.batch_create_reservations("A", &items, "alice").unwrap_err();

        assert_eq!(err.code(), "DUPLICATE_RESERVATION");
        assert!(api.list_appointment_reservations("A").unwrap().is_empty());
    }

    #[test]
    fn test_batch_create_limit() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        let too_many: Vec<BatchReservationItem> =
            (0..51).map(|i| item(&format!("SL-{}", i), 1)).collect();
        match api.batch_create_reservations("A", &too_many, "alice") {
            Err(ApiError::BatchLimitExceeded { count, max }) => {
                assert_eq!(count, 51);
                assert_eq!(max, 50);
            }
            other => panic!("Expected BatchLimitExceeded, got {:?}", other),
        }

        // 配置只能调低上限
        state
            .config_manager
            .set_value(config_keys::BATCH_CREATE_MAX_ITEMS, "2")
            .unwrap();
        let items = vec![item("SL1", 1), item("SL2", 1), item("SL3", 1)];
        assert!(matches!(
            api.batch_create_reservations("A", &items, "alice"),
            Err(ApiError::BatchLimitExceeded { count: 3, max: 2 })
        ));

        assert!(matches!(
            api.batch_create_reservations("A", &[], "alice"),
            Err(ApiError::InvalidInput(_))
        ));
    }

    // ==========================================
    // 批量转移
    // ==========================================

    #[test]
    fn test_batch_move_transfers_totals_not_capacity() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        let l1 = api.create_reservation("A", "SL1", 4, "alice").unwrap();
        let l2 = api.create_reservation("A", "SL2", 3, "alice").unwrap();
        api.create_reservation("B", "SL3", 3, "bob").unwrap();
        assert_eq!(total_units_of(&state, "A"), 7);
        assert_eq!(total_units_of(&state, "B"), 3);

        let ids = vec![l1.reservation_id.clone(), l2.reservation_id.clone()];
        let moved = api.batch_move_reservations(&ids, "B", "ops").unwrap();

        assert_eq!(moved.len(), 2);
        assert!(moved.iter().all(|l| l.appointment_id == "B"));
        assert_eq!(moved[0].reservation_id, l1.reservation_id);
        assert_eq!(moved[0].reserved_units, 4);

        assert_eq!(total_units_of(&state, "A"), 0);
        assert_eq!(total_units_of(&state, "B"), 10);
        assert_eq!(available_of(&state, "SL1"), 6);
        assert_eq!(available_of(&state, "SL2"), 2);
        assert!(api.list_appointment_reservations("A").unwrap().is_empty());
        assert_eq!(api.list_appointment_reservations("B").unwrap().len(), 3);

        let logs = state.action_log_repo.find_by_appointment("B").unwrap();
        let log = logs
            .iter()
            .find(|l| l.action_type == "BATCH_MOVE_RESERVATIONS")
            .unwrap();
        let payload = log.payload_json.as_ref().unwrap();
        assert_eq!(payload["source_appointment_id"], "A");
        assert_eq!(payload["moved_total"], 7);
    }

    #[test]
    fn test_batch_move_requires_single_distinct_source() {
        let (_tmp, state) = setup();
        seed_appointment(&state, "C");
        let api = &state.reservation_api;

        let la = api.create_reservation("A", "SL1", 1, "alice").unwrap();
        let lb = api.create_reservation("B", "SL2", 1, "bob").unwrap();

        let mixed = vec![la.reservation_id.clone(), lb.reservation_id.clone()];
        assert!(matches!(
            api.batch_move_reservations(&mixed, "C", "ops"),
            Err(ApiError::CrossAppointmentMismatch(_))
        ));

        let same = vec![la.reservation_id.clone()];
        assert!(matches!(
            api.batch_move_reservations(&same, "A", "ops"),
            Err(ApiError::CrossAppointmentMismatch(_))
        ));

        assert_eq!(api.get_reservation(&la.reservation_id).unwrap().appointment_id, "A");
        assert_eq!(api.get_reservation(&lb.reservation_id).unwrap().appointment_id, "B");
        assert_eq!(total_units_of(&state, "C"), 0);
    }

    #[test]
    fn test_batch_move_collision_moves_nothing() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        let l1 = api.create_reservation("A", "SL1", 2, "alice").unwrap();
        let l2 = api.create_reservation("A", "SL2", 2, "alice").unwrap();
        api.create_reservation("B", "SL2", 1, "bob").unwrap();

        let ids = vec![l1.reservation_id.clone(), l2.reservation_id.clone()];
        match api.batch_move_reservations(&ids, "B", "ops") {
            Err(ApiError::DuplicateReservation {
                appointment_id,
                shipment_line_id,
            }) => {
                assert_eq!(appointment_id, "B");
                assert_eq!(shipment_line_id, "SL2");
            }
            other => panic!("Expected DuplicateReservation, got {:?}", other),
        }

        assert_eq!(api.get_reservation(&l1.reservation_id).unwrap().appointment_id, "A");
        assert_eq!(total_units_of(&state, "A"), 4);
        assert_eq!(total_units_of(&state, "B"), 1);
    }

    #[test]
    fn test_batch_move_input_errors() {
        let (_tmp, state) = setup();
        let api = &state.reservation_api;

        let l1 = api.create_reservation("A", "SL1", 2, "alice").unwrap();
        let l2 = api.create_reservation("A", "SL2", 2, "alice").unwrap();

        assert!(matches!(
            api.batch_move_reservations(&[l1.reservation_id.clone()], "NOPE", "ops"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.batch_move_reservations(&["NOPE".to_string()], "B", "ops"),
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            api.batch_move_reservations(&[l1.reservation_id.clone(), l1.reservation_id.clone()], "B", "ops"),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            api.batch_move_reservations(&[], "B", "ops"),
            Err(ApiError::InvalidInput(_))
        ));

        state
            .config_manager
            .set_value(config_keys::BATCH_MOVE_MAX_ITEMS, "1")
            .unwrap();
        assert!(matches!(
            api.batch_move_reservations(&[l1.reservation_id.clone(), l2.reservation_id.clone()], "B", "ops"),
            Err(ApiError::BatchLimitExceeded { count: 2, max: 1 })
        ));

        assert_eq!(total_units_of(&state, "A"), 4);
        assert_eq!(total_units_of(&state, "B"), 0);
    }
}
