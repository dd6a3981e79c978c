// ==========================================
// Reconciliation integration tests
// ==========================================
// Normal operation leaves the three occupancy views agreeing; edits
// made behind the engines' backs must surface as anomalies.
// ==========================================


#[cfg(test)]
mod reconciliation_test {
    use crate::test_helpers::{build_state, create_test_db, seed_baseline};
    use chrono::NaiveDate;
    use crane_allocation::api::ApiError;
    use crane_allocation::db::open_sqlite_connection;
    use crane_allocation::engine::{AnomalyKind, AssignRequest};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn assign(state: &crane_allocation::AppState, crane_id: &str, site_id: i64) {
        state
            .allocation_api
            .assign(AssignRequest {
                crane_id: crane_id.to_string(),
                site_id,
                start_date: d(2024, 1, 1),
                monthly_rate: Some(5000.0),
                notes: None,
                responsible_party_id: None,
            })
            .unwrap();
    }

    #[test]
    fn test_empty_database_is_clean() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();

        let report = state.reconciliation_engine.run().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.checked_cranes, 0);
    }

    #[test]
    fn test_full_lifecycle_stays_clean() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();

        assign(&state, "C1", site1);
        let alloc = state.allocation_api.find_active("C1").unwrap().unwrap();
        state.allocation_api.suspend(alloc.id).unwrap();
        state.allocation_api.resume(alloc.id).unwrap();
        state.allocation_api.conclude(alloc.id, d(2024, 6, 30)).unwrap();

        let report = state.reconciliation_engine.run().unwrap();
        assert!(report.is_clean(), "{:?}", report.anomalies);
        assert_eq!(report.checked_cranes, 2);
    }

    #[test]
    fn test_out_of_band_pointer_edit_is_detected() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, site2) = seed_baseline(&state).unwrap();
        assign(&state, "C1", site1);

        // Someone fixes the registry by hand, bypassing the engines.
        let conn = open_sqlite_connection(&db_path).unwrap();
        conn.execute(
            "UPDATE cranes SET current_site_id = ? WHERE id = 'C1'",
            [site2],
        )
        .unwrap();

        let report = state.reconciliation_engine.run().unwrap();
        assert!(report
            .anomalies
            .iter()
            .any(|a| a.crane_id == "C1" && a.kind == AnomalyKind::PointerMismatch));

        let err = state.reconciliation_engine.check_strict().unwrap_err();
        assert!(matches!(err, ApiError::InconsistencyError(_)));
    }

    #[test]
    fn test_deleted_ledger_row_is_detected() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();
        assign(&state, "C1", site1);

        let conn = open_sqlite_connection(&db_path).unwrap();
        conn.execute("DELETE FROM allocation_history WHERE crane_id = 'C1'", [])
            .unwrap();

        let report = state.reconciliation_engine.run().unwrap();
        assert!(report
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::MissingLedgerEntry));
    }

    #[test]
    fn test_ledger_survives_crane_deletion_from_registry() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();
        assign(&state, "C1", site1);
        let alloc = state.allocation_api.find_active("C1").unwrap().unwrap();
        state.allocation_api.conclude(alloc.id, d(2024, 3, 1)).unwrap();

        let conn = open_sqlite_connection(&db_path).unwrap();
        conn.execute("DELETE FROM allocations WHERE crane_id = 'C1'", []).unwrap();
        conn.execute("DELETE FROM cranes WHERE id = 'C1'", []).unwrap();

        // The sweep still covers C1 through its ledger rows, and a
        // Start/End pair replays to "not occupied".
        let report = state.reconciliation_engine.run().unwrap();
        assert!(report.is_clean(), "{:?}", report.anomalies);
        assert_eq!(report.checked_cranes, 2);
    }
}
