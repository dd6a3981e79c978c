// ==========================================
// Request validation
// ==========================================
// Semantic checks that need no store access. Everything here runs
// before a repository is touched, so malformed requests never reach
// SQLite.
// ==========================================

use chrono::NaiveDate;

use crate::api::error::{ApiError, ApiResult};
use crate::engine::{AssignRequest, TransferRequest};

/// Upper bound for free-text fields (notes, transfer reasons).
pub const MAX_NOTE_LEN: usize = 500;

pub fn validate_crane_id(crane_id: &str) -> ApiResult<()> {
    if crane_id.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "crane_id must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_rate(rate: Option<f64>) -> ApiResult<()> {
    if let Some(rate) = rate {
        if !rate.is_finite() || rate < 0.0 {
            return Err(ApiError::ValidationError(format!(
                "monthly rate must be a non-negative number, got {}",
                rate
            )));
        }
    }
    Ok(())
}

pub fn validate_note(field: &str, note: Option<&str>) -> ApiResult<()> {
    if let Some(note) = note {
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(ApiError::ValidationError(format!(
                "{} exceeds {} characters",
                field, MAX_NOTE_LEN
            )));
        }
    }
    Ok(())
}

pub fn validate_window(start: NaiveDate, end: NaiveDate) -> ApiResult<()> {
    if start > end {
        return Err(ApiError::ValidationError(format!(
            "window start {} is after window end {}",
            start, end
        )));
    }
    Ok(())
}

pub fn validate_assign(req: &AssignRequest) -> ApiResult<()> {
    validate_crane_id(&req.crane_id)?;
    validate_rate(req.monthly_rate)?;
    validate_note("notes", req.notes.as_deref())?;
    Ok(())
}

pub fn validate_transfer(req: &TransferRequest) -> ApiResult<()> {
    validate_crane_id(&req.crane_id)?;
    if req.origin_site_id == req.destination_site_id {
        return Err(ApiError::ValidationError(format!(
            "origin and destination are the same site ({})",
            req.origin_site_id
        )));
    }
    validate_rate(req.monthly_rate_override)?;
    validate_note("reason", req.reason.as_deref())?;
    Ok(())
}
