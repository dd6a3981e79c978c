// ==========================================
// Transfer coordinator
// ==========================================
// Moves a crane's Active allocation from one site to another as a single
// unit of work:
//   1. load the crane's Active allocation, require it to match the
//      stated origin (guards against stale-client requests)
//   2. load the destination site
//   3. conclude the origin allocation at the transfer date
//   4. open an Active allocation at the destination, same date,
//      carrying the rate forward unless overridden
//   5. repoint the crane registry at the destination
//   6. append one Transfer ledger entry
//
// SQLite gives us real transactions, so steps 3-6 run inside one; a
// failure at any step rolls everything back and step 3 is never left
// applied on its own. The reconciliation engine still sweeps for the
// anomalies this protects against, since databases also get corrupted
// by crashes and out-of-band edits.
//
// Only transient store failures (busy/locked) are retried, a bounded
// number of times. Validation, not-found and conflict outcomes go
// straight back to the caller.
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::allocation::Allocation;
use crate::domain::crane::CraneStatus;
use crate::domain::history::{HistoryEntry, OperationType};
use crate::repository::allocation_repo::{self, AllocationRepository, NewAllocation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{crane_repo, history_repo, SiteRepository};
use chrono::NaiveDate;
use rusqlite::{Connection, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use super::collaborators::PartyDirectory;

/// Default bound for transient-failure retries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub crane_id: String,
    pub origin_site_id: i64,
    pub destination_site_id: i64,
    pub transfer_date: NaiveDate,
    pub responsible_party_id: i64,
    pub reason: Option<String>,
    /// Carries the origin rate forward when None
    pub monthly_rate_override: Option<f64>,
}

/// Both halves of a completed transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub origin: Allocation,
    pub destination: Allocation,
}

pub struct TransferCoordinator {
    conn: Arc<Mutex<Connection>>,
    allocation_repo: Arc<AllocationRepository>,
    site_repo: Arc<SiteRepository>,
    party_directory: Arc<dyn PartyDirectory>,
    max_attempts: u32,
}

impl TransferCoordinator {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        allocation_repo: Arc<AllocationRepository>,
        site_repo: Arc<SiteRepository>,
        party_directory: Arc<dyn PartyDirectory>,
    ) -> Self {
        Self {
            conn,
            allocation_repo,
            site_repo,
            party_directory,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Execute a transfer. On success all six steps have applied; on
    /// error none of the writes have.
    pub fn transfer(&self, req: &TransferRequest) -> ApiResult<TransferOutcome> {
        // Step 1: the crane's Active allocation must match the stated origin.
        let origin = self
            .allocation_repo
            .find_active_for_crane(&req.crane_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!(
                    "crane {} has no active allocation to transfer",
                    req.crane_id
                ))
            })?;
        if origin.site_id != req.origin_site_id {
            return Err(ApiError::NotFound(format!(
                "crane {} is not active at site {} (currently at site {})",
                req.crane_id, req.origin_site_id, origin.site_id
            )));
        }

        // Step 2: destination must exist; origin site name goes into notes.
        let origin_site = self.site_repo.get(req.origin_site_id)?;
        let destination_site = self.site_repo.get(req.destination_site_id)?;

        if !self.party_directory.exists(req.responsible_party_id)? {
            return Err(ApiError::NotFound(format!(
                "responsible party {} does not exist",
                req.responsible_party_id
            )));
        }
        if req.transfer_date < origin.start_date {
            return Err(ApiError::ValidationError(format!(
                "transfer_date {} precedes the origin allocation start {}",
                req.transfer_date, origin.start_date
            )));
        }

        let rate = req.monthly_rate_override.or(origin.monthly_rate);
        let steps = TransferSteps {
            crane_id: req.crane_id.clone(),
            origin_allocation_id: origin.id,
            destination_site_id: req.destination_site_id,
            transfer_date: req.transfer_date,
            rate,
            responsible_party_id: req.responsible_party_id,
            destination_notes: format!(
                "Transferred from site {} ({}). Reason: {}",
                origin_site.id,
                origin_site.name,
                req.reason.as_deref().unwrap_or("not stated")
            ),
            ledger_notes: format!(
                "Transfer {} -> {} ({} -> {})",
                origin_site.id, destination_site.id, origin_site.name, destination_site.name
            ),
        };

        // Steps 3-6, transactional, with bounded retry on busy.
        let destination_id = run_with_retry(self.max_attempts, || self.run_transactional(&steps))
            .map_err(|e| {
                tracing::error!(
                    crane_id = %req.crane_id,
                    origin_site = req.origin_site_id,
                    destination_site = req.destination_site_id,
                    error = %e,
                    "transfer failed; no partial state was left applied"
                );
                ApiError::from(e)
            })?;

        tracing::info!(
            crane_id = %req.crane_id,
            origin_site = req.origin_site_id,
            destination_site = req.destination_site_id,
            transfer_date = %req.transfer_date,
            "crane transferred"
        );

        Ok(TransferOutcome {
            origin: self.allocation_repo.get(origin.id)?,
            destination: self.allocation_repo.get(destination_id)?,
        })
    }

    fn run_transactional(&self, steps: &TransferSteps) -> RepositoryResult<i64> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))?;
        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let destination_id = apply_transfer_steps(&tx, steps)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(destination_id)
    }
}

/// Write half of the transfer. Every statement runs on the caller's
/// transaction; dropping the transaction undoes all of it.
struct TransferSteps {
    crane_id: String,
    origin_allocation_id: i64,
    destination_site_id: i64,
    transfer_date: NaiveDate,
    rate: Option<f64>,
    responsible_party_id: i64,
    destination_notes: String,
    ledger_notes: String,
}

fn apply_transfer_steps(tx: &Transaction, steps: &TransferSteps) -> RepositoryResult<i64> {
    // Step 3: conclude the origin. The status guard catches an origin
    // concluded by a concurrent writer between our read and this write.
    let rows = allocation_repo::conclude_row(tx, steps.origin_allocation_id, steps.transfer_date)?;
    if rows == 0 {
        return Err(RepositoryError::BusinessRuleViolation(format!(
            "origin allocation {} is no longer active",
            steps.origin_allocation_id
        )));
    }

    // Step 4: open the destination, back-to-back with the origin end.
    let destination_id = allocation_repo::insert_row(
        tx,
        &NewAllocation {
            crane_id: steps.crane_id.clone(),
            site_id: steps.destination_site_id,
            start_date: steps.transfer_date,
            monthly_rate: steps.rate,
            notes: Some(steps.destination_notes.clone()),
        },
    )?;

    // Step 5: repoint the registry; status stays Allocated.
    let rows = crane_repo::set_location_row(
        tx,
        &steps.crane_id,
        Some(steps.destination_site_id),
        CraneStatus::Allocated,
    )?;
    if rows == 0 {
        return Err(RepositoryError::NotFound {
            entity: "Crane".to_string(),
            id: steps.crane_id.clone(),
        });
    }

    // Step 6: one Transfer ledger entry describing the move.
    let entry = HistoryEntry::new(
        steps.crane_id.clone(),
        steps.destination_site_id,
        steps.transfer_date,
        OperationType::Transfer,
    )
    .with_rate(steps.rate)
    .with_responsible_party(Some(steps.responsible_party_id))
    .with_notes(steps.ledger_notes.clone());
    history_repo::append_row(tx, &entry)?;

    Ok(destination_id)
}

/// Retry a unit of work on transient store failures (busy/locked), at
/// most `max_attempts` times. Any other error returns immediately.
fn run_with_retry<T>(
    max_attempts: u32,
    mut op: impl FnMut() -> RepositoryResult<T>,
) -> RepositoryResult<T> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op() {
            Ok(out) => return Ok(out),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                tracing::warn!(attempt, error = %e, "transient store failure, retrying");
            }
            Err(e) => return Err(e),
        }
    }
}
