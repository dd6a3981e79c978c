// ==========================================
// Crane entity (Resource Registry)
// ==========================================
// `current_site_id` is a denormalized pointer into the allocation table.
// It has a single writer: the allocation engine / transfer coordinator.
// Request handlers never touch it directly.
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Coarse equipment status, mirrored from the allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CraneStatus {
    Available,
    Allocated,
    InMaintenance,
}

impl CraneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CraneStatus::Available => "Available",
            CraneStatus::Allocated => "Allocated",
            CraneStatus::InMaintenance => "InMaintenance",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Available" => Some(CraneStatus::Available),
            "Allocated" => Some(CraneStatus::Allocated),
            "InMaintenance" => Some(CraneStatus::InMaintenance),
            _ => None,
        }
    }
}

/// Crane master record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Crane {
    /// Opaque equipment id (assigned at onboarding, e.g. "GRU-0042")
    pub id: String,
    pub name: String,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    /// Rated capacity in tonnes
    pub capacity_t: Option<f64>,
    pub status: CraneStatus,
    /// Denormalized pointer to the site of the Active allocation, if any
    pub current_site_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Crane {
    /// Build a new crane in the Available state.
    pub fn new(id: String, name: String) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id,
            name,
            model: None,
            manufacturer: None,
            capacity_t: None,
            status: CraneStatus::Available,
            current_site_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_specs(
        mut self,
        model: impl Into<String>,
        manufacturer: impl Into<String>,
        capacity_t: f64,
    ) -> Self {
        self.model = Some(model.into());
        self.manufacturer = Some(manufacturer.into());
        self.capacity_t = Some(capacity_t);
        self
    }
}
