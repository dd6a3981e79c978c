// ==========================================
// Application state
// ==========================================
// Owns the shared SQLite connection and every API instance built on
// top of it. Constructed once at startup.
// ==========================================

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};

use crate::api::{AllocationApi, HistoryApi, TransferApi};
use crate::config::AppConfig;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{
    AllocationEngine, OpenBillingGuard, OpenPartyDirectory, ReconciliationEngine,
    TransferCoordinator,
};
use crate::repository::allocation_repo::AllocationRepository;
use crate::repository::{CraneRepository, HistoryRepository, SiteRepository};

pub struct AppState {
    pub db_path: String,

    pub allocation_api: Arc<AllocationApi>,
    pub transfer_api: Arc<TransferApi>,
    pub history_api: Arc<HistoryApi>,
    pub reconciliation_engine: Arc<ReconciliationEngine>,

    pub crane_repo: Arc<CraneRepository>,
    pub site_repo: Arc<SiteRepository>,
}

impl AppState {
    /// Open the database, apply the schema, and build every layer on a
    /// shared connection.
    pub fn new(db_path: String, config: &AppConfig) -> Result<Self> {
        tracing::info!(db_path = %db_path, "initializing application state");

        let conn = open_sqlite_connection(&db_path)
            .with_context(|| format!("cannot open database at {}", db_path))?;
        {
            init_schema(&conn).context("schema initialization failed")?;
        }
        let conn = Arc::new(Mutex::new(conn));

        // Repository layer
        let allocation_repo = Arc::new(AllocationRepository::new(conn.clone()));
        let crane_repo = Arc::new(CraneRepository::new(conn.clone()));
        let site_repo = Arc::new(SiteRepository::new(conn.clone()));
        let history_repo = Arc::new(HistoryRepository::new(conn.clone()));

        // Engine layer. The open collaborators accept everything; real
        // deployments plug in the billing and personnel services here.
        let billing_guard = Arc::new(OpenBillingGuard);
        let party_directory = Arc::new(OpenPartyDirectory);

        let allocation_engine = Arc::new(AllocationEngine::new(
            conn.clone(),
            allocation_repo.clone(),
            crane_repo.clone(),
            site_repo.clone(),
            billing_guard,
        ));
        let transfer_coordinator = Arc::new(
            TransferCoordinator::new(
                conn.clone(),
                allocation_repo.clone(),
                site_repo.clone(),
                party_directory,
            )
            .with_max_attempts(config.transfer_max_attempts),
        );
        let reconciliation_engine = Arc::new(ReconciliationEngine::new(
            allocation_repo.clone(),
            crane_repo.clone(),
            history_repo.clone(),
        ));

        // API layer
        let allocation_api = Arc::new(AllocationApi::new(allocation_engine));
        let transfer_api = Arc::new(TransferApi::new(transfer_coordinator));
        let history_api = Arc::new(HistoryApi::new(
            history_repo,
            crane_repo.clone(),
            site_repo.clone(),
            allocation_repo,
            config.default_history_limit,
        ));

        tracing::info!("application state ready");

        Ok(Self {
            db_path,
            allocation_api,
            transfer_api,
            history_api,
            reconciliation_engine,
            crane_repo,
            site_repo,
        })
    }
}

/// Database location: env override first, then the user data
/// directory, then the working directory as a last resort.
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("CRANE_ALLOCATION_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./crane_allocation.db");

    if let Some(data_dir) = dirs::data_dir() {
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("crane-allocation-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("crane-allocation");
        }

        if let Err(e) = std::fs::create_dir_all(&path) {
            tracing::warn!("cannot create data directory {:?}: {}", path, e);
            return "./crane_allocation.db".to_string();
        }
        path = path.join("crane_allocation.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }
}
