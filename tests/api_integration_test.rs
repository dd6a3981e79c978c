// ==========================================
// Query API integration tests
// ==========================================
// Availability windows, history reads, usage statistics, and the
// fleet status views.
// ==========================================


#[cfg(test)]
mod api_integration_test {
    use crate::test_helpers::{build_state, create_test_db, seed_baseline};
    use chrono::NaiveDate;
    use crane_allocation::api::ApiError;
    use crane_allocation::domain::{AllocationPatch, AllocationStatus, Crane, OperationType};
    use crane_allocation::engine::{AssignRequest, TransferRequest};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn assign(
        state: &crane_allocation::AppState,
        crane_id: &str,
        site_id: i64,
        start: NaiveDate,
        rate: Option<f64>,
    ) -> crane_allocation::Allocation {
        state
            .allocation_api
            .assign(AssignRequest {
                crane_id: crane_id.to_string(),
                site_id,
                start_date: start,
                monthly_rate: rate,
                notes: None,
                responsible_party_id: Some(7),
            })
            .unwrap()
    }

    #[test]
    fn test_availability_window_bounds_are_inclusive() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();

        // A bounded Active allocation: end date recorded via the
        // correction path, so the window still blocks.
        let alloc = assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));
        state
            .allocation_api
            .update(
                alloc.id,
                &AllocationPatch {
                    monthly_rate: None,
                    notes: None,
                    end_date: Some(d(2024, 3, 31)),
                },
            )
            .unwrap();

        // Window ending exactly on the start date conflicts.
        let report = state
            .allocation_api
            .check_availability("C1", d(2023, 12, 1), d(2024, 1, 1))
            .unwrap();
        assert!(!report.available);
        assert_eq!(report.conflicts.len(), 1);

        // Window starting exactly on the end date conflicts.
        let report = state
            .allocation_api
            .check_availability("C1", d(2024, 3, 31), d(2024, 4, 30))
            .unwrap();
        assert!(!report.available);

        // One day past the end is free.
        let report = state
            .allocation_api
            .check_availability("C1", d(2024, 4, 1), d(2024, 4, 30))
            .unwrap();
        assert!(report.available);
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn test_open_ended_allocation_blocks_any_future_window() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();
        assign(&state, "C1", site1, d(2024, 1, 1), None);

        let report = state
            .allocation_api
            .check_availability("C1", d(2030, 1, 1), d(2030, 12, 31))
            .unwrap();
        assert!(!report.available);

        // Before the start the crane was still free.
        let report = state
            .allocation_api
            .check_availability("C1", d(2023, 1, 1), d(2023, 12, 31))
            .unwrap();
        assert!(report.available);
    }

    #[test]
    fn test_availability_rejects_inverted_window_and_unknown_crane() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        seed_baseline(&state).unwrap();

        let err = state
            .allocation_api
            .check_availability("C1", d(2024, 2, 1), d(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = state
            .allocation_api
            .check_availability("ghost", d(2024, 1, 1), d(2024, 2, 1))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_history_reads_newest_first_with_limit() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, site2) = seed_baseline(&state).unwrap();

        assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));
        state
            .transfer_api
            .transfer(TransferRequest {
                crane_id: "C1".to_string(),
                origin_site_id: site1,
                destination_site_id: site2,
                transfer_date: d(2024, 2, 16),
                responsible_party_id: 7,
                reason: None,
                monthly_rate_override: None,
            })
            .unwrap();

        let history = state.history_api.crane_history("C1", None).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].operation_type, OperationType::Transfer);
        assert_eq!(history[1].operation_type, OperationType::Start);

        let limited = state.history_api.crane_history("C1", Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].operation_type, OperationType::Transfer);

        // Site history covers both halves of the move.
        let site1_history = state.history_api.site_history(site1, None).unwrap();
        assert_eq!(site1_history.len(), 1);
        let site2_history = state.history_api.site_history(site2, None).unwrap();
        assert_eq!(site2_history.len(), 1);

        let err = state.history_api.crane_history("ghost", None).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_crane_stats_aggregate_the_ledger() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, site2) = seed_baseline(&state).unwrap();

        assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));
        state
            .transfer_api
            .transfer(TransferRequest {
                crane_id: "C1".to_string(),
                origin_site_id: site1,
                destination_site_id: site2,
                transfer_date: d(2024, 2, 16),
                responsible_party_id: 7,
                reason: None,
                monthly_rate_override: Some(6000.0),
            })
            .unwrap();

        let stats = state.history_api.crane_stats("C1").unwrap();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.distinct_sites, 2);
        assert!((stats.total_rate_volume - 11000.0).abs() < f64::EPSILON);

        // Idle crane has an empty but valid stats row.
        let stats = state.history_api.crane_stats("C2").unwrap();
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.total_rate_volume, 0.0);
    }

    #[test]
    fn test_crane_status_view_reports_next_availability() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();

        // Idle crane: no occupancy, available now.
        let view = state.history_api.crane_status("C1").unwrap();
        assert!(view.open_allocation.is_none());
        assert!(view.next_availability.is_none());

        // Open-ended allocation: occupied with no known release date.
        let alloc = assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));
        let view = state.history_api.crane_status("C1").unwrap();
        assert!(view.open_allocation.is_some());
        assert!(view.next_availability.is_none());

        // An agreed end date shows up as the release date.
        state
            .allocation_api
            .update(
                alloc.id,
                &AllocationPatch {
                    monthly_rate: None,
                    notes: None,
                    end_date: Some(d(2024, 6, 30)),
                },
            )
            .unwrap();
        let view = state.history_api.crane_status("C1").unwrap();
        assert_eq!(view.next_availability, Some(d(2024, 6, 30)));
    }

    #[test]
    fn test_fleet_overview_counts_statuses() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();
        state
            .crane_repo
            .insert(
                &Crane::new("C3".to_string(), "Mobile crane".to_string()),
            )
            .unwrap();

        assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));

        let overview = state.history_api.fleet_overview().unwrap();
        assert_eq!(overview.total_cranes, 3);
        assert_eq!(overview.allocated, 1);
        assert_eq!(overview.available, 2);
        assert_eq!(overview.in_maintenance, 0);
        assert!((overview.availability_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_fleet_availability_for_window() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();

        assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));

        // January: C1 is booked, C2 is free.
        let fleet = state
            .history_api
            .fleet_availability(d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(fleet.total_cranes, 2);
        assert_eq!(fleet.available_count, 1);
        assert_eq!(fleet.occupied_count, 1);
        assert!((fleet.availability_rate - 0.5).abs() < f64::EPSILON);
        let c1 = fleet.cranes.iter().find(|c| c.crane_id == "C1").unwrap();
        assert!(!c1.available);
        assert_eq!(c1.conflicts.len(), 1);

        // Before the allocation started, both were free.
        let fleet = state
            .history_api
            .fleet_availability(d(2023, 6, 1), d(2023, 6, 30))
            .unwrap();
        assert_eq!(fleet.available_count, 2);

        let err = state
            .history_api
            .fleet_availability(d(2024, 2, 1), d(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_site_listing_includes_summary() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();

        assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));
        assign(&state, "C2", site1, d(2024, 2, 1), Some(3800.0));

        let listing = state.allocation_api.list_by_site(site1, None).unwrap();
        assert_eq!(listing.allocations.len(), 2);
        assert_eq!(listing.summary.active_count, 2);
        assert!((listing.summary.total_monthly_rate - 8800.0).abs() < f64::EPSILON);

        let err = state.allocation_api.list_by_site(9999, None).unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_site_listing_honours_status_filter() {
        let (_tmp, db_path) = create_test_db().unwrap();
        let state = build_state(&db_path).unwrap();
        let (site1, _) = seed_baseline(&state).unwrap();

        let first = assign(&state, "C1", site1, d(2024, 1, 1), Some(5000.0));
        state.allocation_api.conclude(first.id, d(2024, 1, 31)).unwrap();
        assign(&state, "C2", site1, d(2024, 2, 1), Some(3800.0));

        let active = state
            .allocation_api
            .list_by_site(site1, Some(AllocationStatus::Active))
            .unwrap();
        assert_eq!(active.allocations.len(), 1);
        assert_eq!(active.allocations[0].crane_id, "C2");
        assert_eq!(active.summary.active_count, 1);

        let concluded = state
            .allocation_api
            .list_by_site(site1, Some(AllocationStatus::Concluded))
            .unwrap();
        assert_eq!(concluded.allocations.len(), 1);
        assert_eq!(concluded.allocations[0].crane_id, "C1");
        assert_eq!(concluded.summary.active_count, 0);
    }
}
