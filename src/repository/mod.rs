// ==========================================
// Crane Allocation Ledger - repository layer
// ==========================================
// Responsibility: data access only. No business rules here; the
// allocation engine and transfer coordinator own those.
// All queries are parameterized.
// ==========================================

pub mod allocation_repo;
pub mod crane_repo;
pub mod error;
pub mod history_repo;
pub mod site_repo;

pub use allocation_repo::AllocationRepository;
pub use crane_repo::{CraneFilter, CraneRepository};
pub use error::{RepositoryError, RepositoryResult};
pub use history_repo::{HistoryRepository, HistoryStats};
pub use site_repo::SiteRepository;
