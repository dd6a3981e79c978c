// ==========================================
// Site entity (Site Registry)
// ==========================================
// Created and mutated by project-management flows, which live outside
// this subsystem. The allocation engine only reads sites.
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteStatus {
    Active,
    Finished,
    Paused,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Active => "Active",
            SiteStatus::Finished => "Finished",
            SiteStatus::Paused => "Paused",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(SiteStatus::Active),
            "Finished" => Some(SiteStatus::Finished),
            "Paused" => Some(SiteStatus::Paused),
            _ => None,
        }
    }
}

/// Construction-site record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub name: String,
    /// Owning client (client catalog is an external collaborator)
    pub client_id: Option<i64>,
    pub status: SiteStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
