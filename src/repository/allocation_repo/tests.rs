use super::core::{AllocationRepository, NewAllocation};
use crate::domain::allocation::{AllocationPatch, AllocationStatus};
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();

    conn.execute("INSERT INTO sites (name) VALUES ('S1'), ('S2'), ('S3')", [])
        .unwrap();
    conn.execute(
        "INSERT INTO cranes (id, name) VALUES ('C1', 'Crane 1'), ('C2', 'Crane 2')",
        [],
    )
    .unwrap();

    Arc::new(Mutex::new(conn))
}

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn new_alloc(crane_id: &str, site_id: i64, start: &str) -> NewAllocation {
    NewAllocation {
        crane_id: crane_id.to_string(),
        site_id,
        start_date: d(start),
        monthly_rate: Some(5000.0),
        notes: None,
    }
}

#[test]
fn test_insert_returns_stored_row() {
    let repo = AllocationRepository::new(setup_test_db());

    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();
    assert!(alloc.id > 0);
    assert_eq!(alloc.crane_id, "C1");
    assert_eq!(alloc.status, AllocationStatus::Active);
    assert_eq!(alloc.monthly_rate, Some(5000.0));
    assert!(alloc.end_date.is_none());
}

#[test]
fn test_second_active_insert_hits_unique_index() {
    let repo = AllocationRepository::new(setup_test_db());

    repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();
    let err = repo.insert(&new_alloc("C1", 2, "2024-02-01")).unwrap_err();
    assert!(matches!(err, RepositoryError::UniqueConstraintViolation(_)));
}

#[test]
fn test_conclude_sets_status_and_end_date() {
    let repo = AllocationRepository::new(setup_test_db());

    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();
    repo.conclude(alloc.id, d("2024-02-16")).unwrap();

    let stored = repo.get(alloc.id).unwrap();
    assert_eq!(stored.status, AllocationStatus::Concluded);
    assert_eq!(stored.end_date, Some(d("2024-02-16")));

    // Concluded frees the crane for a new Active row.
    repo.insert(&new_alloc("C1", 2, "2024-02-16")).unwrap();
}

#[test]
fn test_find_active_and_open_for_crane() {
    let repo = AllocationRepository::new(setup_test_db());

    assert!(repo.find_active_for_crane("C1").unwrap().is_none());

    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();
    assert_eq!(repo.find_active_for_crane("C1").unwrap().unwrap().id, alloc.id);

    // Suspended no longer counts as Active but still occupies the crane.
    repo.set_status(alloc.id, AllocationStatus::Active, AllocationStatus::Suspended)
        .unwrap();
    assert!(repo.find_active_for_crane("C1").unwrap().is_none());
    assert_eq!(repo.find_open_for_crane("C1").unwrap().unwrap().id, alloc.id);
}

#[test]
fn test_set_status_rejects_stale_from_state() {
    let repo = AllocationRepository::new(setup_test_db());
    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();

    // Row is Active; a transition guarded on Suspended must not apply.
    let err = repo
        .set_status(alloc.id, AllocationStatus::Suspended, AllocationStatus::Active)
        .unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound { .. }));
    assert_eq!(repo.get(alloc.id).unwrap().status, AllocationStatus::Active);
}

#[test]
fn test_window_query_inclusive_bounds() {
    let repo = AllocationRepository::new(setup_test_db());

    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-10")).unwrap();
    repo.conclude(alloc.id, d("2024-01-20")).unwrap();
    // Re-open as a bounded Active row for the window tests.
    repo.set_status(alloc.id, AllocationStatus::Concluded, AllocationStatus::Active)
        .unwrap();

    // Inclusive at both ends.
    assert_eq!(
        repo.find_occupying_in_window("C1", d("2024-01-20"), d("2024-01-31")).unwrap().len(),
        1
    );
    assert_eq!(
        repo.find_occupying_in_window("C1", d("2024-01-01"), d("2024-01-10")).unwrap().len(),
        1
    );
    assert!(repo
        .find_occupying_in_window("C1", d("2024-01-21"), d("2024-01-31"))
        .unwrap()
        .is_empty());

    // Concluded never blocks.
    repo.conclude(alloc.id, d("2024-01-20")).unwrap();
    assert!(repo
        .find_occupying_in_window("C1", d("2024-01-10"), d("2024-01-20"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_open_ended_allocation_blocks_future_windows() {
    let repo = AllocationRepository::new(setup_test_db());
    repo.insert(&new_alloc("C1", 1, "2024-01-10")).unwrap();

    assert_eq!(
        repo.find_occupying_in_window("C1", d("2030-06-01"), d("2030-06-30")).unwrap().len(),
        1
    );
    assert!(repo
        .find_occupying_in_window("C1", d("2024-01-01"), d("2024-01-09"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_apply_patch_only_touches_provided_fields() {
    let repo = AllocationRepository::new(setup_test_db());
    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();

    repo.apply_patch(
        alloc.id,
        &AllocationPatch {
            monthly_rate: Some(6200.0),
            notes: None,
            end_date: None,
        },
    )
    .unwrap();

    let stored = repo.get(alloc.id).unwrap();
    assert_eq!(stored.monthly_rate, Some(6200.0));
    assert_eq!(stored.status, AllocationStatus::Active);
    assert!(stored.end_date.is_none());
}

#[test]
fn test_list_by_site_with_status_filter() {
    let repo = AllocationRepository::new(setup_test_db());

    let a1 = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();
    repo.conclude(a1.id, d("2024-02-01")).unwrap();
    repo.insert(&new_alloc("C2", 1, "2024-02-01")).unwrap();

    assert_eq!(repo.list_by_site(1, None).unwrap().len(), 2);
    assert_eq!(
        repo.list_by_site(1, Some(AllocationStatus::Active)).unwrap().len(),
        1
    );
    assert!(repo.list_by_site(2, None).unwrap().is_empty());
}

#[test]
fn test_delete_removes_row() {
    let repo = AllocationRepository::new(setup_test_db());
    let alloc = repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();

    repo.delete(alloc.id).unwrap();
    assert!(repo.find_by_id(alloc.id).unwrap().is_none());
    assert!(matches!(repo.delete(alloc.id).unwrap_err(), RepositoryError::NotFound { .. }));
}

#[test]
fn test_cranes_with_multiple_open_flags_corruption() {
    let db = setup_test_db();
    let repo = AllocationRepository::new(db.clone());

    repo.insert(&new_alloc("C1", 1, "2024-01-01")).unwrap();
    assert!(repo.cranes_with_multiple_open().unwrap().is_empty());

    // Bypass the engine to fabricate the anomaly (Active + Suspended).
    db.lock()
        .unwrap()
        .execute(
            "INSERT INTO allocations (crane_id, site_id, start_date, status)
             VALUES ('C1', 2, '2024-02-01', 'Suspended')",
            [],
        )
        .unwrap();

    assert_eq!(repo.cranes_with_multiple_open().unwrap(), vec!["C1".to_string()]);
}
