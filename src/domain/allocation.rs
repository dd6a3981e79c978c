// ==========================================
// Allocation entity
// ==========================================
// The core record: a time-bounded assignment of a crane to a site.
// Invariant: at most one Active allocation per crane at any instant,
// enforced by the partial unique index in db::init_schema.
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    Active,
    Concluded,
    Suspended,
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Active => "Active",
            AllocationStatus::Concluded => "Concluded",
            AllocationStatus::Suspended => "Suspended",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(AllocationStatus::Active),
            "Concluded" => Some(AllocationStatus::Concluded),
            "Suspended" => Some(AllocationStatus::Suspended),
            _ => None,
        }
    }

    /// Active and Suspended both occupy the crane for conflict and
    /// availability purposes; only Concluded frees it.
    pub fn occupies_crane(&self) -> bool {
        matches!(self, AllocationStatus::Active | AllocationStatus::Suspended)
    }
}

/// A time-bounded assignment of a crane to a site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: i64,
    pub crane_id: String,
    pub site_id: i64,
    pub start_date: NaiveDate,
    /// None while the allocation is open
    pub end_date: Option<NaiveDate>,
    pub monthly_rate: Option<f64>,
    pub status: AllocationStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Allocation {
    /// Inclusive overlap test against a date window.
    ///
    /// An open-ended allocation (end_date = None) extends indefinitely,
    /// so it overlaps every window at or after its start date.
    pub fn overlaps_window(&self, window_start: NaiveDate, window_end: NaiveDate) -> bool {
        if self.start_date > window_end {
            return false;
        }
        match self.end_date {
            Some(end) => end >= window_start,
            None => true,
        }
    }
}

/// Fields accepted by the partial-update (PUT) path.
///
/// Everything is optional; None means "leave unchanged". The patch
/// cannot clear a stored value back to NULL; unsetting end_date goes
/// through reopen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationPatch {
    pub monthly_rate: Option<f64>,
    pub notes: Option<String>,
    pub end_date: Option<NaiveDate>,
}
