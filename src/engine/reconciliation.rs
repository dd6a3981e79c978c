// ==========================================
// Reconciliation engine
// ==========================================
// Cross-checks the three views the system keeps of crane occupancy:
// open allocation rows, the crane registry's location pointer, and the
// append-only ledger. Divergence is reported, never silently repaired;
// an operator decides which view is the truth.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::crane::CraneStatus;
use crate::domain::history::OperationType;
use crate::repository::allocation_repo::AllocationRepository;
use crate::repository::{CraneFilter, CraneRepository, HistoryRepository};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AnomalyKind {
    /// More than one Active or Suspended allocation row for one crane.
    MultipleOpenAllocations,
    /// Registry pointer disagrees with the open allocation (or with its
    /// absence).
    PointerMismatch,
    /// Crane holds an open allocation but the ledger has no entry for it.
    MissingLedgerEntry,
    /// Replaying the ledger ends at a different site than the
    /// allocation table says.
    LedgerReplayDivergence,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub crane_id: String,
    pub kind: AnomalyKind,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub checked_cranes: usize,
    pub anomalies: Vec<Anomaly>,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.anomalies.is_empty()
    }
}

pub struct ReconciliationEngine {
    allocation_repo: Arc<AllocationRepository>,
    crane_repo: Arc<CraneRepository>,
    history_repo: Arc<HistoryRepository>,
}

impl ReconciliationEngine {
    pub fn new(
        allocation_repo: Arc<AllocationRepository>,
        crane_repo: Arc<CraneRepository>,
        history_repo: Arc<HistoryRepository>,
    ) -> Self {
        Self {
            allocation_repo,
            crane_repo,
            history_repo,
        }
    }

    /// Sweep every known crane and collect anomalies.
    pub fn run(&self) -> ApiResult<ReconciliationReport> {
        let mut crane_ids: BTreeSet<String> = self
            .crane_repo
            .list(&CraneFilter::default())?
            .into_iter()
            .map(|c| c.id)
            .collect();
        // Cranes deleted from the registry can still have ledger rows.
        crane_ids.extend(self.history_repo.crane_ids()?);

        let mut anomalies = Vec::new();
        let multiple_open: BTreeSet<String> = self
            .allocation_repo
            .cranes_with_multiple_open()?
            .into_iter()
            .collect();

        for crane_id in &crane_ids {
            if multiple_open.contains(crane_id) {
                anomalies.push(Anomaly {
                    crane_id: crane_id.clone(),
                    kind: AnomalyKind::MultipleOpenAllocations,
                    detail: "more than one Active/Suspended allocation row".to_string(),
                });
                // The other checks assume a single open row.
                continue;
            }
            let open = self.allocation_repo.find_open_for_crane(crane_id)?;
            let crane = self.crane_repo.find_by_id(crane_id)?;

            if let Some(crane) = &crane {
                match (&open, crane.current_site_id) {
                    (Some(alloc), Some(site)) if alloc.site_id != site => {
                        anomalies.push(Anomaly {
                            crane_id: crane_id.clone(),
                            kind: AnomalyKind::PointerMismatch,
                            detail: format!(
                                "open allocation at site {} but registry points at site {}",
                                alloc.site_id, site
                            ),
                        });
                    }
                    (Some(alloc), None) => {
                        anomalies.push(Anomaly {
                            crane_id: crane_id.clone(),
                            kind: AnomalyKind::PointerMismatch,
                            detail: format!(
                                "open allocation at site {} but registry has no location",
                                alloc.site_id
                            ),
                        });
                    }
                    (None, Some(site)) if crane.status != CraneStatus::InMaintenance => {
                        anomalies.push(Anomaly {
                            crane_id: crane_id.clone(),
                            kind: AnomalyKind::PointerMismatch,
                            detail: format!(
                                "no open allocation but registry points at site {}",
                                site
                            ),
                        });
                    }
                    _ => {}
                }
            }

            let ledger = self.history_repo.list_by_crane_chronological(crane_id)?;
            if open.is_some() && ledger.is_empty() {
                anomalies.push(Anomaly {
                    crane_id: crane_id.clone(),
                    kind: AnomalyKind::MissingLedgerEntry,
                    detail: "open allocation with an empty ledger".to_string(),
                });
                continue;
            }

            // Replay: Start/Transfer/Resume occupy a site, End clears,
            // Pause leaves the crane occupied where it stands.
            let mut replayed_site: Option<i64> = None;
            for entry in &ledger {
                match entry.operation_type {
                    OperationType::Start | OperationType::Transfer | OperationType::Resume => {
                        replayed_site = Some(entry.site_id);
                    }
                    OperationType::End => replayed_site = None,
                    OperationType::Pause => {}
                }
            }
            let actual_site = open.as_ref().map(|a| a.site_id);
            if replayed_site != actual_site {
                anomalies.push(Anomaly {
                    crane_id: crane_id.clone(),
                    kind: AnomalyKind::LedgerReplayDivergence,
                    detail: format!(
                        "ledger replay ends at {:?}, allocation table says {:?}",
                        replayed_site, actual_site
                    ),
                });
            }
        }

        let report = ReconciliationReport {
            checked_cranes: crane_ids.len(),
            anomalies,
        };
        if report.is_clean() {
            tracing::info!(checked = report.checked_cranes, "reconciliation clean");
        } else {
            for a in &report.anomalies {
                tracing::warn!(crane_id = %a.crane_id, kind = ?a.kind, detail = %a.detail, "reconciliation anomaly");
            }
        }
        Ok(report)
    }

    /// Like [`run`](Self::run) but anomalies become a hard error.
    pub fn check_strict(&self) -> ApiResult<ReconciliationReport> {
        let report = self.run()?;
        if report.is_clean() {
            Ok(report)
        } else {
            Err(ApiError::InconsistencyError(format!(
                "{} anomalies across {} cranes; first: {} ({:?})",
                report.anomalies.len(),
                report.checked_cranes,
                report.anomalies[0].crane_id,
                report.anomalies[0].kind
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn setup() -> (
        Arc<Mutex<Connection>>,
        ReconciliationEngine,
    ) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute("INSERT INTO sites (name) VALUES ('S1'), ('S2')", []).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let engine = ReconciliationEngine::new(
            Arc::new(AllocationRepository::new(Arc::clone(&conn))),
            Arc::new(CraneRepository::new(Arc::clone(&conn))),
            Arc::new(HistoryRepository::new(Arc::clone(&conn))),
        );
        (conn, engine)
    }

    fn exec(conn: &Arc<Mutex<Connection>>, sql: &str) {
        conn.lock().unwrap().execute(sql, []).unwrap();
    }

    #[test]
    fn test_consistent_state_is_clean() {
        let (conn, engine) = setup();
        exec(&conn, "INSERT INTO cranes (id, name, status, current_site_id) VALUES ('C1', 'Crane', 'Allocated', 1)");
        exec(&conn, "INSERT INTO allocations (crane_id, site_id, start_date, status) VALUES ('C1', 1, '2024-01-01', 'Active')");
        exec(&conn, "INSERT INTO allocation_history (entry_id, crane_id, site_id, start_date, operation_type) VALUES ('e1', 'C1', 1, '2024-01-01', 'Start')");

        let report = engine.run().unwrap();
        assert!(report.is_clean(), "{:?}", report.anomalies);
        assert_eq!(report.checked_cranes, 1);
    }

    #[test]
    fn test_pointer_mismatch_detected() {
        let (conn, engine) = setup();
        exec(&conn, "INSERT INTO cranes (id, name, status, current_site_id) VALUES ('C1', 'Crane', 'Allocated', 2)");
        exec(&conn, "INSERT INTO allocations (crane_id, site_id, start_date, status) VALUES ('C1', 1, '2024-01-01', 'Active')");
        exec(&conn, "INSERT INTO allocation_history (entry_id, crane_id, site_id, start_date, operation_type) VALUES ('e1', 'C1', 1, '2024-01-01', 'Start')");

        let report = engine.run().unwrap();
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].kind, AnomalyKind::PointerMismatch);
    }

    #[test]
    fn test_missing_ledger_entry_detected() {
        let (conn, engine) = setup();
        exec(&conn, "INSERT INTO cranes (id, name, status, current_site_id) VALUES ('C1', 'Crane', 'Allocated', 1)");
        exec(&conn, "INSERT INTO allocations (crane_id, site_id, start_date, status) VALUES ('C1', 1, '2024-01-01', 'Active')");

        let report = engine.run().unwrap();
        assert!(report
            .anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::MissingLedgerEntry));
    }

    #[test]
    fn test_replay_divergence_detected() {
        let (conn, engine) = setup();
        exec(&conn, "INSERT INTO cranes (id, name, status) VALUES ('C1', 'Crane', 'Available')");
        // Ledger says the crane is still at site 1; allocation table
        // has nothing open.
        exec(&conn, "INSERT INTO allocation_history (entry_id, crane_id, site_id, start_date, operation_type) VALUES ('e1', 'C1', 1, '2024-01-01', 'Start')");

        let report = engine.run().unwrap();
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].kind, AnomalyKind::LedgerReplayDivergence);
    }

    #[test]
    fn test_pause_keeps_crane_occupied_in_replay() {
        let (conn, engine) = setup();
        exec(&conn, "INSERT INTO cranes (id, name, status, current_site_id) VALUES ('C1', 'Crane', 'Allocated', 1)");
        exec(&conn, "INSERT INTO allocations (crane_id, site_id, start_date, status) VALUES ('C1', 1, '2024-01-01', 'Suspended')");
        exec(&conn, "INSERT INTO allocation_history (entry_id, crane_id, site_id, start_date, operation_type) VALUES ('e1', 'C1', 1, '2024-01-01', 'Start')");
        exec(&conn, "INSERT INTO allocation_history (entry_id, crane_id, site_id, start_date, operation_type) VALUES ('e2', 'C1', 1, '2024-03-01', 'Pause')");

        let report = engine.run().unwrap();
        assert!(report.is_clean(), "{:?}", report.anomalies);
    }

    #[test]
    fn test_multiple_open_short_circuits() {
        let (conn, engine) = setup();
        exec(&conn, "INSERT INTO cranes (id, name, status, current_site_id) VALUES ('C1', 'Crane', 'Allocated', 1)");
        exec(&conn, "INSERT INTO allocations (crane_id, site_id, start_date, status) VALUES ('C1', 1, '2024-01-01', 'Suspended')");
        exec(&conn, "INSERT INTO allocations (crane_id, site_id, start_date, status) VALUES ('C1', 2, '2024-02-01', 'Suspended')");

        let report = engine.run().unwrap();
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].kind, AnomalyKind::MultipleOpenAllocations);
        assert!(engine.check_strict().is_err());
    }
}
