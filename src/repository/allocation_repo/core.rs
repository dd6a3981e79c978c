use crate::domain::allocation::{Allocation, AllocationPatch, AllocationStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// Insert payload for a new allocation. Status is always Active on
/// creation; transitions go through the dedicated update methods.
#[derive(Debug, Clone)]
pub struct NewAllocation {
    pub crane_id: String,
    pub site_id: i64,
    pub start_date: NaiveDate,
    pub monthly_rate: Option<f64>,
    pub notes: Option<String>,
}

pub struct AllocationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AllocationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // Writes
    // ==========================================
    // The statements live in the free *_row functions below so the
    // engines can run the same writes on their own transactions. The
    // methods here are the single-statement convenience wrappers.

    /// Insert a new Active allocation and return the stored row.
    ///
    /// A UNIQUE violation here means a concurrent writer won the race for
    /// the crane; the caller maps it to a conflict.
    pub fn insert(&self, new: &NewAllocation) -> RepositoryResult<Allocation> {
        let id = {
            let conn = self.get_conn()?;
            insert_row(&conn, new)?
        };
        self.get(id)
    }

    /// Conclude an Active allocation: status + end_date in one statement.
    pub fn conclude(&self, allocation_id: i64, end_date: NaiveDate) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if conclude_row(&conn, allocation_id, end_date)? == 0 {
            return Err(self.not_found(allocation_id));
        }
        Ok(())
    }

    /// Flip status without touching end_date (suspend / resume). The
    /// `from` guard makes the flip a no-op on rows that moved under us.
    pub fn set_status(
        &self,
        allocation_id: i64,
        from: AllocationStatus,
        to: AllocationStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if set_status_row(&conn, allocation_id, from, to)? == 0 {
            return Err(self.not_found(allocation_id));
        }
        Ok(())
    }

    /// Reopen a Concluded allocation: back to Active with the end date
    /// cleared. The partial unique index rejects this when the crane
    /// already has another Active row.
    pub fn reopen(&self, allocation_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if reopen_row(&conn, allocation_id)? == 0 {
            return Err(self.not_found(allocation_id));
        }
        Ok(())
    }

    /// Apply a partial update (rate / notes / end_date corrections).
    ///
    /// None fields are left as stored. Clearing a stored notes or
    /// end_date value back to NULL is not supported through this path;
    /// that correction goes through conclude/reopen or raw maintenance
    /// SQL.
    pub fn apply_patch(&self, allocation_id: i64, patch: &AllocationPatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"
            UPDATE allocations
            SET monthly_rate = COALESCE(?, monthly_rate),
                notes        = COALESCE(?, notes),
                end_date     = COALESCE(?, end_date),
                updated_at   = datetime('now')
            WHERE id = ?
            "#,
            params![
                patch.monthly_rate,
                patch.notes,
                patch.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
                allocation_id,
            ],
        )?;
        if rows == 0 {
            return Err(self.not_found(allocation_id));
        }
        Ok(())
    }

    /// Physically delete an Active allocation row.
    ///
    /// Only the engine's unwind path calls this; Concluded rows are
    /// retained for history and financial reporting.
    pub fn delete(&self, allocation_id: i64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if delete_row(&conn, allocation_id)? == 0 {
            return Err(self.not_found(allocation_id));
        }
        Ok(())
    }

    pub(super) fn not_found(&self, allocation_id: i64) -> RepositoryError {
        RepositoryError::NotFound {
            entity: "Allocation".to_string(),
            id: allocation_id.to_string(),
        }
    }
}

// ==========================================
// Transaction-friendly write statements
// ==========================================
// Each takes a plain &Connection, so a rusqlite::Transaction derefs
// straight in. Guarded statements return the affected row count; the
// caller decides whether 0 rows is not-found or a lost race.

pub(crate) fn insert_row(conn: &Connection, new: &NewAllocation) -> RepositoryResult<i64> {
    conn.execute(
        r#"
        INSERT INTO allocations (crane_id, site_id, start_date, monthly_rate, status, notes)
        VALUES (?, ?, ?, ?, 'Active', ?)
        "#,
        params![
            new.crane_id,
            new.site_id,
            new.start_date.format("%Y-%m-%d").to_string(),
            new.monthly_rate,
            new.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn conclude_row(
    conn: &Connection,
    allocation_id: i64,
    end_date: NaiveDate,
) -> RepositoryResult<usize> {
    let rows = conn.execute(
        r#"
        UPDATE allocations
        SET status = 'Concluded', end_date = ?, updated_at = datetime('now')
        WHERE id = ? AND status = 'Active'
        "#,
        params![end_date.format("%Y-%m-%d").to_string(), allocation_id],
    )?;
    Ok(rows)
}

pub(crate) fn set_status_row(
    conn: &Connection,
    allocation_id: i64,
    from: AllocationStatus,
    to: AllocationStatus,
) -> RepositoryResult<usize> {
    let rows = conn.execute(
        r#"
        UPDATE allocations
        SET status = ?, updated_at = datetime('now')
        WHERE id = ? AND status = ?
        "#,
        params![to.as_str(), allocation_id, from.as_str()],
    )?;
    Ok(rows)
}

pub(crate) fn reopen_row(conn: &Connection, allocation_id: i64) -> RepositoryResult<usize> {
    let rows = conn.execute(
        r#"
        UPDATE allocations
        SET status = 'Active', end_date = NULL, updated_at = datetime('now')
        WHERE id = ? AND status = 'Concluded'
        "#,
        params![allocation_id],
    )?;
    Ok(rows)
}

pub(crate) fn delete_row(conn: &Connection, allocation_id: i64) -> RepositoryResult<usize> {
    let rows = conn.execute(
        "DELETE FROM allocations WHERE id = ? AND status = 'Active'",
        params![allocation_id],
    )?;
    Ok(rows)
}

/// True when the crane has any Active or Suspended allocation.
pub(crate) fn has_open_row(conn: &Connection, crane_id: &str) -> RepositoryResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM allocations WHERE crane_id = ? AND status IN ('Active', 'Suspended')",
        params![crane_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
