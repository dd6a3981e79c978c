// ==========================================
// Allocation engine
// ==========================================
// Owns the allocation lifecycle: assign, conclude, suspend/resume,
// availability and the per-site rollup. Every state-changing operation
// runs as one transaction covering the allocation row, the registry
// pointer and the matching ledger entry; a failure in any of the three
// leaves none of them applied.
//
// The pre-insert conflict check is a fresh read, but it is only there
// for a friendly error message: the partial unique index in the schema
// is what actually serializes concurrent assigns.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::{Allocation, AllocationPatch, AllocationStatus};
use crate::domain::crane::CraneStatus;
use crate::domain::history::{HistoryEntry, OperationType};
use crate::repository::allocation_repo::{self, AllocationRepository, NewAllocation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{crane_repo, history_repo};
use crate::repository::{CraneRepository, SiteRepository};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::collaborators::BillingGuard;

/// Assign-crane-to-site request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub crane_id: String,
    pub site_id: i64,
    pub start_date: NaiveDate,
    pub monthly_rate: Option<f64>,
    pub notes: Option<String>,
    pub responsible_party_id: Option<i64>,
}

/// Availability verdict plus whatever blocks the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityReport {
    pub crane_id: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub available: bool,
    pub conflicts: Vec<Allocation>,
}

/// Rollup attached to a site's allocation listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteAllocationSummary {
    pub total: usize,
    pub active_count: usize,
    /// Sum of monthly_rate over Active allocations
    pub total_monthly_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteAllocations {
    pub allocations: Vec<Allocation>,
    pub summary: SiteAllocationSummary,
}

pub struct AllocationEngine {
    conn: Arc<Mutex<Connection>>,
    allocation_repo: Arc<AllocationRepository>,
    crane_repo: Arc<CraneRepository>,
    site_repo: Arc<SiteRepository>,
    billing_guard: Arc<dyn BillingGuard>,
}

impl AllocationEngine {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        allocation_repo: Arc<AllocationRepository>,
        crane_repo: Arc<CraneRepository>,
        site_repo: Arc<SiteRepository>,
        billing_guard: Arc<dyn BillingGuard>,
    ) -> Self {
        Self {
            conn,
            allocation_repo,
            crane_repo,
            site_repo,
            billing_guard,
        }
    }

    /// Run one unit of work on its own transaction. The closure gets the
    /// open transaction; any error rolls every statement back.
    fn in_transaction<T>(
        &self,
        work: impl FnOnce(&Transaction) -> RepositoryResult<T>,
    ) -> RepositoryResult<T> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        let out = work(&tx)?;
        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(out)
    }

    // ==========================================
    // Assign
    // ==========================================

    /// Open a new Active allocation for a crane at a site.
    pub fn assign(&self, req: &AssignRequest) -> ApiResult<Allocation> {
        let crane = self.crane_repo.get(&req.crane_id)?;
        if crane.status == CraneStatus::InMaintenance {
            return Err(ApiError::ConflictError(format!(
                "crane {} is in maintenance and cannot be assigned",
                crane.id
            )));
        }
        let site = self.site_repo.get(req.site_id)?;

        // Friendly pre-check; the unique index is the real gate.
        if let Some(open) = self.allocation_repo.find_open_for_crane(&req.crane_id)? {
            return Err(ApiError::ConflictError(format!(
                "crane {} already has a {} allocation at site {}",
                req.crane_id,
                open.status.as_str(),
                open.site_id
            )));
        }

        let new = NewAllocation {
            crane_id: req.crane_id.clone(),
            site_id: req.site_id,
            start_date: req.start_date,
            monthly_rate: req.monthly_rate,
            notes: req.notes.clone(),
        };
        let entry = HistoryEntry::new(
            req.crane_id.clone(),
            req.site_id,
            req.start_date,
            OperationType::Start,
        )
        .with_rate(req.monthly_rate)
        .with_responsible_party(req.responsible_party_id)
        .with_notes(format!("Assigned to site {} ({})", site.id, site.name));

        let allocation_id = self.in_transaction(|tx| {
            let id = allocation_repo::insert_row(tx, &new)?;
            repoint_crane(tx, &req.crane_id, Some(req.site_id), CraneStatus::Allocated)?;
            history_repo::append_row(tx, &entry)?;
            Ok(id)
        })?;

        tracing::info!(
            crane_id = %req.crane_id,
            site_id = req.site_id,
            allocation_id,
            "crane assigned"
        );
        self.allocation_repo.get(allocation_id).map_err(Into::into)
    }

    // ==========================================
    // Conclude
    // ==========================================

    /// Conclude an Active allocation; frees the crane unless a transfer
    /// supersedes the pointer update in the same unit of work.
    pub fn conclude(&self, allocation_id: i64, end_date: NaiveDate) -> ApiResult<Allocation> {
        let alloc = self.allocation_repo.get(allocation_id)?;
        match alloc.status {
            AllocationStatus::Active => {}
            AllocationStatus::Suspended => {
                return Err(ApiError::ConflictError(format!(
                    "allocation {} is suspended; resume it before concluding",
                    allocation_id
                )))
            }
            AllocationStatus::Concluded => {
                return Err(ApiError::ConflictError(format!(
                    "allocation {} is already concluded",
                    allocation_id
                )))
            }
        }
        if end_date < alloc.start_date {
            return Err(ApiError::ValidationError(format!(
                "end_date {} precedes start_date {}",
                end_date, alloc.start_date
            )));
        }

        let entry = HistoryEntry::new(
            alloc.crane_id.clone(),
            alloc.site_id,
            alloc.start_date,
            OperationType::End,
        )
        .with_end_date(end_date)
        .with_rate(alloc.monthly_rate);

        self.in_transaction(|tx| {
            if allocation_repo::conclude_row(tx, allocation_id, end_date)? == 0 {
                return Err(stale_row(allocation_id));
            }
            // The concluded allocation was the crane's only open one
            // unless the store is corrupted, so the crane becomes
            // available.
            if !allocation_repo::has_open_row(tx, &alloc.crane_id)? {
                repoint_crane(tx, &alloc.crane_id, None, CraneStatus::Available)?;
            }
            history_repo::append_row(tx, &entry)?;
            Ok(())
        })?;

        tracing::info!(allocation_id, crane_id = %alloc.crane_id, %end_date, "allocation concluded");
        self.allocation_repo.get(allocation_id).map_err(Into::into)
    }

    // ==========================================
    // Suspend / Resume
    // ==========================================

    /// Temporary stoppage. A Suspended allocation still occupies the
    /// crane, so the registry pointer is left untouched.
    pub fn suspend(&self, allocation_id: i64) -> ApiResult<Allocation> {
        let alloc = self.allocation_repo.get(allocation_id)?;
        if alloc.status != AllocationStatus::Active {
            return Err(ApiError::ConflictError(format!(
                "allocation {} is {} and cannot be suspended",
                allocation_id,
                alloc.status.as_str()
            )));
        }

        let entry = HistoryEntry::new(
            alloc.crane_id.clone(),
            alloc.site_id,
            alloc.start_date,
            OperationType::Pause,
        )
        .with_rate(alloc.monthly_rate);

        self.in_transaction(|tx| {
            let rows = allocation_repo::set_status_row(
                tx,
                allocation_id,
                AllocationStatus::Active,
                AllocationStatus::Suspended,
            )?;
            if rows == 0 {
                return Err(stale_row(allocation_id));
            }
            history_repo::append_row(tx, &entry)?;
            Ok(())
        })?;

        tracing::info!(allocation_id, crane_id = %alloc.crane_id, "allocation suspended");
        self.allocation_repo.get(allocation_id).map_err(Into::into)
    }

    pub fn resume(&self, allocation_id: i64) -> ApiResult<Allocation> {
        let alloc = self.allocation_repo.get(allocation_id)?;
        if alloc.status != AllocationStatus::Suspended {
            return Err(ApiError::ConflictError(format!(
                "allocation {} is {} and cannot be resumed",
                allocation_id,
                alloc.status.as_str()
            )));
        }

        let entry = HistoryEntry::new(
            alloc.crane_id.clone(),
            alloc.site_id,
            alloc.start_date,
            OperationType::Resume,
        )
        .with_rate(alloc.monthly_rate);

        self.in_transaction(|tx| {
            let rows = allocation_repo::set_status_row(
                tx,
                allocation_id,
                AllocationStatus::Suspended,
                AllocationStatus::Active,
            )?;
            if rows == 0 {
                return Err(stale_row(allocation_id));
            }
            history_repo::append_row(tx, &entry)?;
            Ok(())
        })?;

        tracing::info!(allocation_id, crane_id = %alloc.crane_id, "allocation resumed");
        self.allocation_repo.get(allocation_id).map_err(Into::into)
    }

    // ==========================================
    // Reads
    // ==========================================

    pub fn find_active(&self, crane_id: &str) -> ApiResult<Option<Allocation>> {
        self.allocation_repo
            .find_active_for_crane(crane_id)
            .map_err(Into::into)
    }

    /// A crane is available in a window iff no Active or Suspended
    /// allocation overlaps it (inclusive bounds). Concluded never blocks.
    pub fn check_availability(
        &self,
        crane_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> ApiResult<AvailabilityReport> {
        if window_start > window_end {
            return Err(ApiError::ValidationError(format!(
                "window_start {} is after window_end {}",
                window_start, window_end
            )));
        }
        self.crane_repo.get(crane_id)?;

        let conflicts =
            self.allocation_repo
                .find_occupying_in_window(crane_id, window_start, window_end)?;
        Ok(AvailabilityReport {
            crane_id: crane_id.to_string(),
            window_start,
            window_end,
            available: conflicts.is_empty(),
            conflicts,
        })
    }

    pub fn list_by_site(
        &self,
        site_id: i64,
        status: Option<AllocationStatus>,
    ) -> ApiResult<SiteAllocations> {
        self.site_repo.get(site_id)?;
        let allocations = self.allocation_repo.list_by_site(site_id, status)?;

        let active: Vec<_> = allocations
            .iter()
            .filter(|a| a.status == AllocationStatus::Active)
            .collect();
        let summary = SiteAllocationSummary {
            total: allocations.len(),
            active_count: active.len(),
            total_monthly_rate: active.iter().filter_map(|a| a.monthly_rate).sum(),
        };
        Ok(SiteAllocations { allocations, summary })
    }

    // ==========================================
    // Corrections
    // ==========================================

    /// Reopen a Concluded allocation that was concluded in error.
    ///
    /// Fails with a conflict when the crane has since been assigned
    /// elsewhere (the unique index fires on the status flip). The
    /// Resume ledger entry reopens the occupancy for replay purposes.
    pub fn reopen(&self, allocation_id: i64) -> ApiResult<Allocation> {
        let alloc = self.allocation_repo.get(allocation_id)?;
        if alloc.status != AllocationStatus::Concluded {
            return Err(ApiError::ConflictError(format!(
                "allocation {} is {}; only Concluded allocations can be reopened",
                allocation_id,
                alloc.status.as_str()
            )));
        }

        let entry = HistoryEntry::new(
            alloc.crane_id.clone(),
            alloc.site_id,
            alloc.start_date,
            OperationType::Resume,
        )
        .with_rate(alloc.monthly_rate)
        .with_notes("Concluded allocation reopened");

        self.in_transaction(|tx| {
            if allocation_repo::reopen_row(tx, allocation_id)? == 0 {
                return Err(stale_row(allocation_id));
            }
            repoint_crane(tx, &alloc.crane_id, Some(alloc.site_id), CraneStatus::Allocated)?;
            history_repo::append_row(tx, &entry)?;
            Ok(())
        })?;

        tracing::info!(allocation_id, crane_id = %alloc.crane_id, "allocation reopened");
        self.allocation_repo.get(allocation_id).map_err(Into::into)
    }

    /// Partial update for corrections not covered by transfer.
    pub fn update(&self, allocation_id: i64, patch: &AllocationPatch) -> ApiResult<Allocation> {
        let alloc = self.allocation_repo.get(allocation_id)?;
        if let Some(end_date) = patch.end_date {
            if end_date < alloc.start_date {
                return Err(ApiError::ValidationError(format!(
                    "end_date {} precedes start_date {}",
                    end_date, alloc.start_date
                )));
            }
        }
        if let Some(rate) = patch.monthly_rate {
            if rate < 0.0 {
                return Err(ApiError::ValidationError("monthly_rate must be >= 0".into()));
            }
        }

        self.allocation_repo.apply_patch(allocation_id, patch)?;
        tracing::info!(allocation_id, "allocation patched");
        self.allocation_repo.get(allocation_id).map_err(Into::into)
    }

    /// Unwind an Active allocation that should never have been opened.
    ///
    /// Concluded allocations are retained for reporting and cannot be
    /// deleted; finalized billing records block deletion outright. The
    /// unwind appends an End entry marked as such, so the ledger replay
    /// stays truthful without editing past entries.
    pub fn delete(&self, allocation_id: i64) -> ApiResult<()> {
        let alloc = self.allocation_repo.get(allocation_id)?;
        if alloc.status != AllocationStatus::Active {
            return Err(ApiError::ConflictError(format!(
                "allocation {} is {}; only Active allocations can be unwound",
                allocation_id,
                alloc.status.as_str()
            )));
        }
        if self.billing_guard.has_finalized_records(allocation_id)? {
            return Err(ApiError::DependencyError(format!(
                "allocation {} has finalized billing records and cannot be deleted",
                allocation_id
            )));
        }

        let entry = HistoryEntry::new(
            alloc.crane_id.clone(),
            alloc.site_id,
            alloc.start_date,
            OperationType::End,
        )
        .with_end_date(alloc.start_date)
        .with_rate(alloc.monthly_rate)
        .with_notes("Allocation unwound before conclusion");

        self.in_transaction(|tx| {
            if allocation_repo::delete_row(tx, allocation_id)? == 0 {
                return Err(stale_row(allocation_id));
            }
            if !allocation_repo::has_open_row(tx, &alloc.crane_id)? {
                repoint_crane(tx, &alloc.crane_id, None, CraneStatus::Available)?;
            }
            history_repo::append_row(tx, &entry)?;
            Ok(())
        })?;

        tracing::info!(allocation_id, crane_id = %alloc.crane_id, "allocation unwound");
        Ok(())
    }
}

/// Registry pointer update inside a unit of work; a missing crane at
/// this point means it was deleted between our read and the write.
fn repoint_crane(
    tx: &Transaction,
    crane_id: &str,
    site_id: Option<i64>,
    status: CraneStatus,
) -> RepositoryResult<()> {
    if crane_repo::set_location_row(tx, crane_id, site_id, status)? == 0 {
        return Err(RepositoryError::NotFound {
            entity: "Crane".to_string(),
            id: crane_id.to_string(),
        });
    }
    Ok(())
}

/// The guarded write hit zero rows: the allocation changed (or vanished)
/// between the precondition read and the transaction.
fn stale_row(allocation_id: i64) -> RepositoryError {
    RepositoryError::BusinessRuleViolation(format!(
        "allocation {} changed state concurrently; operation not applied",
        allocation_id
    ))
}
