// ==========================================
// History ledger repository
// ==========================================
// Append-only: insert plus reads. There is deliberately no update or
// delete method on this type; seed/maintenance cleanup goes through raw
// SQL outside normal operation.
//
// Ordering: entries for a crane are returned by rowid, which follows
// insertion order exactly. created_at only has second granularity and
// may collide.
// ==========================================

use crate::domain::history::{HistoryEntry, OperationType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

const SELECT_COLS: &str = "id, entry_id, crane_id, site_id, start_date, end_date, \
                           responsible_party_id, operation_type, rate, notes, created_at";

/// Rental statistics derived from the ledger for one crane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStats {
    pub total_entries: i64,
    /// Sum of (end_date - start_date) over entries carrying both dates
    pub total_rented_days: i64,
    /// Sum of the rate column over all entries carrying one
    pub total_rate_volume: f64,
    pub distinct_sites: i64,
}

pub struct HistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

impl HistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Append one entry; returns its ledger rowid.
    pub fn record(&self, entry: &HistoryEntry) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        append_row(&conn, entry)
    }

    /// Newest-first listing for a crane.
    pub fn list_by_crane(&self, crane_id: &str, limit: i64) -> RepositoryResult<Vec<HistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLS} FROM allocation_history
            WHERE crane_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#
        ))?;

        let entries = stmt
            .query_map(params![crane_id, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// Oldest-first listing for a crane; replay order for reconciliation.
    pub fn list_by_crane_chronological(&self, crane_id: &str) -> RepositoryResult<Vec<HistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLS} FROM allocation_history
            WHERE crane_id = ?
            ORDER BY id ASC
            "#
        ))?;

        let entries = stmt
            .query_map(params![crane_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// Newest-first listing for a site.
    pub fn list_by_site(&self, site_id: i64, limit: i64) -> RepositoryResult<Vec<HistoryEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {SELECT_COLS} FROM allocation_history
            WHERE site_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#
        ))?;

        let entries = stmt
            .query_map(params![site_id, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// All crane ids that appear in the ledger (reconciliation sweep).
    pub fn crane_ids(&self) -> RepositoryResult<Vec<String>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT crane_id FROM allocation_history ORDER BY crane_id")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(ids)
    }

    /// Rental statistics rollup for one crane.
    pub fn stats_for_crane(&self, crane_id: &str) -> RepositoryResult<HistoryStats> {
        let conn = self.get_conn()?;
        let stats = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(
                       CASE WHEN end_date IS NOT NULL
                            THEN julianday(end_date) - julianday(start_date)
                            ELSE 0 END), 0),
                   COALESCE(SUM(rate), 0.0),
                   COUNT(DISTINCT site_id)
            FROM allocation_history
            WHERE crane_id = ?
            "#,
            params![crane_id],
            |row| {
                Ok(HistoryStats {
                    total_entries: row.get(0)?,
                    total_rented_days: row.get::<_, f64>(1)? as i64,
                    total_rate_volume: row.get(2)?,
                    distinct_sites: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }
}

/// Append statement shared with the engines' transactions (a
/// rusqlite::Transaction derefs to &Connection).
pub(crate) fn append_row(conn: &Connection, entry: &HistoryEntry) -> RepositoryResult<i64> {
    conn.execute(
        r#"
        INSERT INTO allocation_history (
            entry_id, crane_id, site_id, start_date, end_date,
            responsible_party_id, operation_type, rate, notes, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            entry.entry_id,
            entry.crane_id,
            entry.site_id,
            entry.start_date.format("%Y-%m-%d").to_string(),
            entry.end_date.map(|d| d.format("%Y-%m-%d").to_string()),
            entry.responsible_party_id,
            entry.operation_type.as_str(),
            entry.rate,
            entry.notes,
            entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn map_row(row: &Row) -> SqliteResult<HistoryEntry> {
    let start_date_str: String = row.get(4)?;
    let end_date_str: Option<String> = row.get(5)?;
    let op_str: String = row.get(7)?;
    let created_at_str: String = row.get(10)?;

    let operation_type = OperationType::from_str(&op_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown operation type: {}", op_str).into(),
        )
    })?;

    let parse_date = |s: &str, col: usize| {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
    };

    Ok(HistoryEntry {
        id: row.get(0)?,
        entry_id: row.get(1)?,
        crane_id: row.get(2)?,
        site_id: row.get(3)?,
        start_date: parse_date(&start_date_str, 4)?,
        end_date: match end_date_str {
            Some(s) => Some(parse_date(&s, 5)?),
            None => None,
        },
        responsible_party_id: row.get(6)?,
        operation_type,
        rate: row.get(8)?,
        notes: row.get(9)?,
        created_at: super::crane_repo::parse_ts(&created_at_str, 10)?,
    })
}
