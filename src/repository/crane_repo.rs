// ==========================================
// Crane repository (Resource Registry adapter)
// ==========================================
// Thin read/write adapter over the cranes table. The registry pointer
// (`current_site_id` + status) has exactly one writer: the engine layer,
// via the pub(crate) set_location. Request handlers cannot reach it.
// ==========================================

use crate::domain::crane::{Crane, CraneStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// Optional listing filter.
#[derive(Debug, Clone, Default)]
pub struct CraneFilter {
    pub status: Option<CraneStatus>,
    pub site_id: Option<i64>,
}

pub struct CraneRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CraneRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Insert a crane master record (equipment onboarding path).
    pub fn insert(&self, crane: &Crane) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO cranes (id, name, model, manufacturer, capacity_t,
                                status, current_site_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                crane.id,
                crane.name,
                crane.model,
                crane.manufacturer,
                crane.capacity_t,
                crane.status.as_str(),
                crane.current_site_id,
                crane.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                crane.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, crane_id: &str) -> RepositoryResult<Option<Crane>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, name, model, manufacturer, capacity_t,
                   status, current_site_id, created_at, updated_at
            FROM cranes
            WHERE id = ?
            "#,
        )?;

        match stmt.query_row(params![crane_id], map_row) {
            Ok(crane) => Ok(Some(crane)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Like find_by_id, but a missing crane is an error.
    pub fn get(&self, crane_id: &str) -> RepositoryResult<Crane> {
        self.find_by_id(crane_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Crane".to_string(),
                id: crane_id.to_string(),
            })
    }

    pub fn list(&self, filter: &CraneFilter) -> RepositoryResult<Vec<Crane>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            r#"
            SELECT id, name, model, manufacturer, capacity_t,
                   status, current_site_id, created_at, updated_at
            FROM cranes
            WHERE 1=1
            "#,
        );
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            args.push(Box::new(status.as_str().to_string()));
        }
        if let Some(site_id) = filter.site_id {
            sql.push_str(" AND current_site_id = ?");
            args.push(Box::new(site_id));
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let cranes = stmt
            .query_map(rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())), map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(cranes)
    }

    /// Update the registry pointer and coarse status.
    ///
    /// pub(crate): only the allocation engine and the transfer coordinator
    /// may call this, so pointer consistency stays centralized.
    pub(crate) fn set_location(
        &self,
        crane_id: &str,
        site_id: Option<i64>,
        status: CraneStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        if set_location_row(&conn, crane_id, site_id, status)? == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Crane".to_string(),
                id: crane_id.to_string(),
            });
        }
        Ok(())
    }
}

/// Pointer statement shared with the engines' transactions (a
/// rusqlite::Transaction derefs to &Connection). Returns the affected
/// row count; 0 means the crane is not in the registry.
pub(crate) fn set_location_row(
    conn: &Connection,
    crane_id: &str,
    site_id: Option<i64>,
    status: CraneStatus,
) -> RepositoryResult<usize> {
    let rows = conn.execute(
        r#"
        UPDATE cranes
        SET current_site_id = ?, status = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
        params![site_id, status.as_str(), crane_id],
    )?;
    Ok(rows)
}

fn map_row(row: &Row) -> SqliteResult<Crane> {
    let status_str: String = row.get(5)?;
    let status = CraneStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown crane status: {}", status_str).into(),
        )
    })?;

    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Crane {
        id: row.get(0)?,
        name: row.get(1)?,
        model: row.get(2)?,
        manufacturer: row.get(3)?,
        capacity_t: row.get(4)?,
        status,
        current_site_id: row.get(6)?,
        created_at: parse_ts(&created_at_str, 7)?,
        updated_at: parse_ts(&updated_at_str, 8)?,
    })
}

pub(crate) fn parse_ts(s: &str, col: usize) -> SqliteResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}
