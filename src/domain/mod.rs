// ==========================================
// Crane Allocation Ledger - domain layer
// ==========================================
// Entities and enums shared by every layer above.
// No data access, no business rules here.
// ==========================================

pub mod allocation;
pub mod crane;
pub mod history;
pub mod site;

pub use allocation::{Allocation, AllocationPatch, AllocationStatus};
pub use crane::{Crane, CraneStatus};
pub use history::{HistoryEntry, OperationType};
pub use site::{Site, SiteStatus};
