// ==========================================
// Crane Allocation Ledger - engine layer
// ==========================================
// Business rules live here and only here:
// - AllocationEngine: assign / conclude / suspend / resume / availability
// - TransferCoordinator: the multi-record transfer unit of work
// - ReconciliationEngine: ledger-vs-state divergence detection
// Repositories stay rule-free; the API layer stays a validated facade.
// ==========================================

pub mod allocation_engine;
pub mod collaborators;
pub mod reconciliation;
pub mod transfer;

pub use allocation_engine::{
    AllocationEngine, AssignRequest, AvailabilityReport, SiteAllocationSummary, SiteAllocations,
};
pub use collaborators::{BillingGuard, OpenBillingGuard, OpenPartyDirectory, PartyDirectory};
pub use reconciliation::{Anomaly, AnomalyKind, ReconciliationEngine, ReconciliationReport};
pub use transfer::{TransferCoordinator, TransferOutcome, TransferRequest};
