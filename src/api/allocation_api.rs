// ==========================================
// Allocation API
// ==========================================
// Facade over the allocation engine. Validates requests, delegates,
// and shapes results for callers.
// ==========================================

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::debug;

use crate::api::error::ApiResult;
use crate::api::validator;
use crate::domain::allocation::{Allocation, AllocationPatch, AllocationStatus};
use crate::engine::{AllocationEngine, AssignRequest, AvailabilityReport, SiteAllocations};

pub struct AllocationApi {
    engine: Arc<AllocationEngine>,
}

impl AllocationApi {
    pub fn new(engine: Arc<AllocationEngine>) -> Self {
        Self { engine }
    }

    /// Open an Active allocation for an idle crane.
    pub fn assign(&self, req: AssignRequest) -> ApiResult<Allocation> {
        validator::validate_assign(&req)?;
        self.engine.assign(&req)
    }

    /// Conclude an Active allocation at the given end date.
    pub fn conclude(&self, allocation_id: i64, end_date: NaiveDate) -> ApiResult<Allocation> {
        self.engine.conclude(allocation_id, end_date)
    }

    /// Pause an Active allocation. The crane stays occupied.
    pub fn suspend(&self, allocation_id: i64) -> ApiResult<Allocation> {
        self.engine.suspend(allocation_id)
    }

    /// Resume a Suspended allocation.
    pub fn resume(&self, allocation_id: i64) -> ApiResult<Allocation> {
        self.engine.resume(allocation_id)
    }

    /// The crane's Active allocation, if any.
    pub fn find_active(&self, crane_id: &str) -> ApiResult<Option<Allocation>> {
        validator::validate_crane_id(crane_id)?;
        self.engine.find_active(crane_id)
    }

    /// Whether the crane is free across the whole window, bounds
    /// inclusive, and which allocations conflict if not.
    pub fn check_availability(
        &self,
        crane_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> ApiResult<AvailabilityReport> {
        validator::validate_crane_id(crane_id)?;
        validator::validate_window(window_start, window_end)?;
        debug!(crane_id, %window_start, %window_end, "availability check");
        self.engine.check_availability(crane_id, window_start, window_end)
    }

    /// Allocations recorded against a site, optionally filtered by
    /// status, with an Active rollup.
    pub fn list_by_site(
        &self,
        site_id: i64,
        status: Option<AllocationStatus>,
    ) -> ApiResult<SiteAllocations> {
        self.engine.list_by_site(site_id, status)
    }

    /// Reopen an allocation concluded in error. Refused once the crane
    /// has been assigned elsewhere.
    pub fn reopen(&self, allocation_id: i64) -> ApiResult<Allocation> {
        self.engine.reopen(allocation_id)
    }

    /// Partial update of mutable fields. None fields stay untouched.
    pub fn update(&self, allocation_id: i64, patch: &AllocationPatch) -> ApiResult<Allocation> {
        validator::validate_rate(patch.monthly_rate)?;
        validator::validate_note("notes", patch.notes.as_deref())?;
        self.engine.update(allocation_id, patch)
    }

    /// Remove an allocation opened in error. Refused once billing has
    /// finalized records against it; conclude instead in that case.
    pub fn delete(&self, allocation_id: i64) -> ApiResult<()> {
        self.engine.delete(allocation_id)
    }
}
