// ==========================================
// Site repository (Site Registry adapter)
// ==========================================
// Read-mostly: the allocation engine references sites but never mutates
// them. Insert exists for onboarding flows and test seeding.
// ==========================================

use crate::domain::site::{Site, SiteStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct SiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SiteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Insert a site, returning its generated id.
    pub fn insert(&self, name: &str, client_id: Option<i64>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO sites (name, client_id) VALUES (?, ?)",
            params![name, client_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn find_by_id(&self, site_id: i64) -> RepositoryResult<Option<Site>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, client_id, status, created_at, updated_at FROM sites WHERE id = ?",
        )?;

        match stmt.query_row(params![site_id], map_row) {
            Ok(site) => Ok(Some(site)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Like find_by_id, but a missing site is an error.
    pub fn get(&self, site_id: i64) -> RepositoryResult<Site> {
        self.find_by_id(site_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "Site".to_string(),
                id: site_id.to_string(),
            })
    }

    pub fn list(&self, status: Option<SiteStatus>) -> RepositoryResult<Vec<Site>> {
        let conn = self.get_conn()?;

        let sites = match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, client_id, status, created_at, updated_at
                     FROM sites WHERE status = ? ORDER BY id",
                )?;
                let rows = stmt
                    .query_map(params![status.as_str()], map_row)?
                    .collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT id, name, client_id, status, created_at, updated_at
                     FROM sites ORDER BY id",
                )?;
                let rows = stmt.query_map([], map_row)?.collect::<SqliteResult<Vec<_>>>()?;
                rows
            }
        };
        Ok(sites)
    }
}

fn map_row(row: &Row) -> SqliteResult<Site> {
    let status_str: String = row.get(3)?;
    let status = SiteStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown site status: {}", status_str).into(),
        )
    })?;

    let created_at_str: String = row.get(4)?;
    let updated_at_str: String = row.get(5)?;

    Ok(Site {
        id: row.get(0)?,
        name: row.get(1)?,
        client_id: row.get(2)?,
        status,
        created_at: super::crane_repo::parse_ts(&created_at_str, 4)?,
        updated_at: super::crane_repo::parse_ts(&updated_at_str, 5)?,
    })
}
