// ==========================================
// History & status API
// ==========================================
// Read side of the ledger: per-crane and per-site history, usage
// statistics, and the fleet status views built on top of the
// allocation table.
// ==========================================

use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::validator;
use crate::domain::allocation::Allocation;
use crate::domain::crane::{Crane, CraneStatus};
use crate::domain::history::HistoryEntry;
use crate::repository::allocation_repo::AllocationRepository;
use crate::repository::{CraneFilter, CraneRepository, HistoryRepository, HistoryStats, SiteRepository};

/// One crane with its current occupancy.
#[derive(Debug, Clone, Serialize)]
pub struct CraneStatusView {
    pub crane: Crane,
    pub open_allocation: Option<Allocation>,
    /// When the crane frees up. None for idle cranes and for
    /// open-ended allocations with no agreed end.
    pub next_availability: Option<NaiveDate>,
}

/// One crane's verdict within a fleet availability sweep.
#[derive(Debug, Clone, Serialize)]
pub struct CraneAvailability {
    pub crane_id: String,
    pub name: String,
    pub status: CraneStatus,
    pub available: bool,
    pub conflicts: Vec<Allocation>,
}

/// Whole-fleet availability for a date window.
#[derive(Debug, Clone, Serialize)]
pub struct FleetAvailability {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub total_cranes: usize,
    pub available_count: usize,
    pub occupied_count: usize,
    /// available_count / total_cranes, 0.0 for an empty fleet.
    pub availability_rate: f64,
    pub cranes: Vec<CraneAvailability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetOverview {
    pub total_cranes: usize,
    pub available: usize,
    pub allocated: usize,
    pub in_maintenance: usize,
    /// available / total, 0.0 for an empty fleet.
    pub availability_rate: f64,
}

pub struct HistoryApi {
    history_repo: Arc<HistoryRepository>,
    crane_repo: Arc<CraneRepository>,
    site_repo: Arc<SiteRepository>,
    allocation_repo: Arc<AllocationRepository>,
    default_limit: usize,
}

impl HistoryApi {
    pub fn new(
        history_repo: Arc<HistoryRepository>,
        crane_repo: Arc<CraneRepository>,
        site_repo: Arc<SiteRepository>,
        allocation_repo: Arc<AllocationRepository>,
        default_limit: usize,
    ) -> Self {
        Self {
            history_repo,
            crane_repo,
            site_repo,
            allocation_repo,
            default_limit,
        }
    }

    /// Ledger entries for one crane, newest first.
    pub fn crane_history(&self, crane_id: &str, limit: Option<usize>) -> ApiResult<Vec<HistoryEntry>> {
        validator::validate_crane_id(crane_id)?;
        self.crane_repo.get(crane_id)?;
        let limit = limit.unwrap_or(self.default_limit) as i64;
        Ok(self.history_repo.list_by_crane(crane_id, limit)?)
    }

    /// Ledger entries touching one site, newest first.
    pub fn site_history(&self, site_id: i64, limit: Option<usize>) -> ApiResult<Vec<HistoryEntry>> {
        self.site_repo.get(site_id)?;
        let limit = limit.unwrap_or(self.default_limit) as i64;
        Ok(self.history_repo.list_by_site(site_id, limit)?)
    }

    /// Aggregate usage figures for one crane.
    pub fn crane_stats(&self, crane_id: &str) -> ApiResult<HistoryStats> {
        validator::validate_crane_id(crane_id)?;
        self.crane_repo.get(crane_id)?;
        Ok(self.history_repo.stats_for_crane(crane_id)?)
    }

    /// Registry record plus current occupancy for one crane.
    pub fn crane_status(&self, crane_id: &str) -> ApiResult<CraneStatusView> {
        validator::validate_crane_id(crane_id)?;
        let crane = self.crane_repo.get(crane_id)?;
        let open_allocation = self.allocation_repo.find_open_for_crane(crane_id)?;
        let next_availability = open_allocation.as_ref().and_then(|a| a.end_date);
        Ok(CraneStatusView {
            crane,
            open_allocation,
            next_availability,
        })
    }

    /// Availability verdict for every crane across a date window.
    ///
    /// Cranes in maintenance count as unavailable regardless of their
    /// allocation rows.
    pub fn fleet_availability(
        &self,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> ApiResult<FleetAvailability> {
        validator::validate_window(window_start, window_end)?;

        let all = self.crane_repo.list(&CraneFilter::default())?;
        let mut cranes = Vec::with_capacity(all.len());
        let mut available_count = 0;
        for crane in all {
            let conflicts = self.allocation_repo.find_occupying_in_window(
                &crane.id,
                window_start,
                window_end,
            )?;
            let available = conflicts.is_empty() && crane.status != CraneStatus::InMaintenance;
            if available {
                available_count += 1;
            }
            cranes.push(CraneAvailability {
                crane_id: crane.id.clone(),
                name: crane.name.clone(),
                status: crane.status,
                available,
                conflicts,
            });
        }

        let total_cranes = cranes.len();
        Ok(FleetAvailability {
            window_start,
            window_end,
            total_cranes,
            available_count,
            occupied_count: total_cranes - available_count,
            availability_rate: if total_cranes == 0 {
                0.0
            } else {
                available_count as f64 / total_cranes as f64
            },
            cranes,
        })
    }

    /// Status counts over the whole registry.
    pub fn fleet_overview(&self) -> ApiResult<FleetOverview> {
        let cranes = self.crane_repo.list(&CraneFilter::default())?;
        let total_cranes = cranes.len();
        let mut available = 0;
        let mut allocated = 0;
        let mut in_maintenance = 0;
        for crane in &cranes {
            match crane.status {
                CraneStatus::Available => available += 1,
                CraneStatus::Allocated => allocated += 1,
                CraneStatus::InMaintenance => in_maintenance += 1,
            }
        }
        let availability_rate = if total_cranes == 0 {
            0.0
        } else {
            available as f64 / total_cranes as f64
        };
        Ok(FleetOverview {
            total_cranes,
            available,
            allocated,
            in_maintenance,
            availability_rate,
        })
    }
}
