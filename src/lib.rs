// ==========================================
// Crane allocation & transfer ledger
// ==========================================
// Tracks which crane works which site, moves cranes between sites as
// atomic transfers, and keeps an append-only ledger of every
// deployment event.
//
// Layering:
//   domain     - entities and enums
//   repository - SQLite persistence
//   engine     - business rules (assign, transfer, reconcile)
//   api        - validated facades
//   app        - wiring and shared state
// ==========================================

pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod repository;

pub use api::{AllocationApi, ApiError, ApiResult, HistoryApi, TransferApi};
pub use app::{get_default_db_path, AppState};
pub use config::AppConfig;
pub use domain::{Allocation, AllocationStatus, Crane, CraneStatus, HistoryEntry, OperationType, Site, SiteStatus};
pub use engine::{
    AllocationEngine, AssignRequest, ReconciliationEngine, TransferCoordinator, TransferOutcome,
    TransferRequest,
};

pub const APP_NAME: &str = "crane-allocation";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
