use super::core::AllocationRepository;
use crate::domain::allocation::{Allocation, AllocationStatus};
use crate::repository::error::RepositoryResult;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Result as SqliteResult, Row};

const SELECT_COLS: &str = "id, crane_id, site_id, start_date, end_date, monthly_rate, \
                           status, notes, created_at, updated_at";

impl AllocationRepository {
    // ==========================================
    // Queries
    // ==========================================

    pub fn find_by_id(&self, allocation_id: i64) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM allocations WHERE id = ?"
        ))?;

        match stmt.query_row(params![allocation_id], map_row) {
            Ok(alloc) => Ok(Some(alloc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Like find_by_id, but a missing row is an error.
    pub fn get(&self, allocation_id: i64) -> RepositoryResult<Allocation> {
        self.find_by_id(allocation_id)?
            .ok_or_else(|| self.not_found(allocation_id))
    }

    /// The crane's Active allocation, if any. The partial unique index
    /// guarantees there is at most one.
    pub fn find_active_for_crane(&self, crane_id: &str) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLS} FROM allocations WHERE crane_id = ? AND status = 'Active'"
        ))?;

        match stmt.query_row(params![crane_id], map_row) {
            Ok(alloc) => Ok(Some(alloc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// The crane's occupying allocation: Active or Suspended.
    ///
    /// A Suspended allocation still occupies the crane for conflict-check
    /// purposes, so assign must look at both.
    pub fn find_open_for_crane(&self, crane_id: &str) -> RepositoryResult<Option<Allocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLS} FROM allocations
            WHERE crane_id = ? AND status IN ('Active', 'Suspended')
            ORDER BY id DESC
            LIMIT 1
            "#
        ))?;

        match stmt.query_row(params![crane_id], map_row) {
            Ok(alloc) => Ok(Some(alloc)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Occupying allocations overlapping a date window, inclusive bounds.
    ///
    /// An open-ended allocation (end_date IS NULL) extends indefinitely, so
    /// only its start date gates the overlap. Concluded rows never block.
    pub fn find_occupying_in_window(
        &self,
        crane_id: &str,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLS} FROM allocations
            WHERE crane_id = ?
              AND status IN ('Active', 'Suspended')
              AND start_date <= ?
              AND (end_date IS NULL OR end_date >= ?)
            ORDER BY start_date
            "#
        ))?;

        let allocs = stmt
            .query_map(
                params![
                    crane_id,
                    window_end.format("%Y-%m-%d").to_string(),
                    window_start.format("%Y-%m-%d").to_string(),
                ],
                map_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(allocs)
    }

    pub fn list_by_site(
        &self,
        site_id: i64,
        status: Option<AllocationStatus>,
    ) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;

        let allocs = match status {
            Some(status) => {
                let mut stmt = conn.prepare(&format!(
                    r#"
                    SELECT {SELECT_COLS} FROM allocations
                    WHERE site_id = ? AND status = ?
                    ORDER BY start_date DESC, id DESC
                    "#
                ))?;
                let rows = stmt
                    .query_map(params![site_id, status.as_str()], map_row)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    r#"
                    SELECT {SELECT_COLS} FROM allocations
                    WHERE site_id = ?
                    ORDER BY start_date DESC, id DESC
                    "#
                ))?;
                let rows = stmt
                    .query_map(params![site_id], map_row)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(allocs)
    }

    pub fn list_by_crane(&self, crane_id: &str) -> RepositoryResult<Vec<Allocation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLS} FROM allocations
            WHERE crane_id = ?
            ORDER BY start_date DESC, id DESC
            "#
        ))?;

        let allocs = stmt
            .query_map(params![crane_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(allocs)
    }

    /// Cranes holding more than one open (Active or Suspended) allocation.
    /// Normal operation never produces this; the reconciliation engine
    /// scans for it.
    pub fn cranes_with_multiple_open(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT crane_id FROM allocations
            WHERE status IN ('Active', 'Suspended')
            GROUP BY crane_id
            HAVING COUNT(*) > 1
            ORDER BY crane_id
            "#,
        )?;

        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }
}

// ==========================================
// Row mapping
// ==========================================

pub(super) fn map_row(row: &Row) -> SqliteResult<Allocation> {
    let start_date_str: String = row.get(3)?;
    let end_date_str: Option<String> = row.get(4)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: String = row.get(9)?;

    let status = AllocationStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            format!("unknown allocation status: {}", status_str).into(),
        )
    })?;

    Ok(Allocation {
        id: row.get(0)?,
        crane_id: row.get(1)?,
        site_id: row.get(2)?,
        start_date: parse_date(&start_date_str, 3)?,
        end_date: match end_date_str {
            Some(s) => Some(parse_date(&s, 4)?),
            None => None,
        },
        monthly_rate: row.get(5)?,
        status,
        notes: row.get(7)?,
        created_at: parse_ts(&created_at_str, 8)?,
        updated_at: parse_ts(&updated_at_str, 9)?,
    })
}

fn parse_date(s: &str, col: usize) -> SqliteResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_ts(s: &str, col: usize) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}
