// ==========================================
// History ledger entry
// ==========================================
// Append-only. One entry per state-changing allocation operation; never
// edited or removed in normal operation. The ledger answers "what
// happened"; the allocation table answers "what is true now".
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Lifecycle operation recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Start,
    Transfer,
    End,
    Pause,
    Resume,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Start => "Start",
            OperationType::Transfer => "Transfer",
            OperationType::End => "End",
            OperationType::Pause => "Pause",
            OperationType::Resume => "Resume",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Start" => Some(OperationType::Start),
            "Transfer" => Some(OperationType::Transfer),
            "End" => Some(OperationType::End),
            "Pause" => Some(OperationType::Pause),
            "Resume" => Some(OperationType::Resume),
            _ => None,
        }
    }

    /// True for the operations that open a site occupancy for the crane.
    pub fn opens_occupancy(&self) -> bool {
        matches!(self, OperationType::Start | OperationType::Transfer | OperationType::Resume)
    }
}

/// One audit-trail record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Ledger rowid; creation order for a crane follows this, not created_at
    pub id: i64,
    /// Stable external id (uuid)
    pub entry_id: String,
    pub crane_id: String,
    pub site_id: i64,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// HR/user directory id of whoever ordered the operation
    pub responsible_party_id: Option<i64>,
    pub operation_type: OperationType,
    pub rate: Option<f64>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl HistoryEntry {
    /// Build an entry ready for insertion (id is assigned by the store).
    pub fn new(
        crane_id: String,
        site_id: i64,
        start_date: NaiveDate,
        operation_type: OperationType,
    ) -> Self {
        Self {
            id: 0,
            entry_id: uuid::Uuid::new_v4().to_string(),
            crane_id,
            site_id,
            start_date,
            end_date: None,
            responsible_party_id: None,
            operation_type,
            rate: None,
            notes: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn with_end_date(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_rate(mut self, rate: Option<f64>) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_responsible_party(mut self, party_id: Option<i64>) -> Self {
        self.responsible_party_id = party_id;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
