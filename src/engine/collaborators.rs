// ==========================================
// External collaborator seams
// ==========================================
// Billing/measurement records and the HR/user directory live outside
// this subsystem. The engines consume them through these traits; the
// default implementations accept everything, which matches running
// without the external services wired in. Tests substitute mocks.
// ==========================================

use crate::repository::error::RepositoryResult;

/// Downstream billing/measurement check consulted before an allocation
/// may be physically deleted.
pub trait BillingGuard: Send + Sync {
    /// True if a finalized billing or measurement record references the
    /// allocation, which blocks deletion.
    fn has_finalized_records(&self, allocation_id: i64) -> RepositoryResult<bool>;
}

/// HR/user directory lookup for responsible parties on transfers.
pub trait PartyDirectory: Send + Sync {
    fn exists(&self, party_id: i64) -> RepositoryResult<bool>;
}

/// Permissive default: nothing blocks deletion.
pub struct OpenBillingGuard;

impl BillingGuard for OpenBillingGuard {
    fn has_finalized_records(&self, _allocation_id: i64) -> RepositoryResult<bool> {
        Ok(false)
    }
}

/// Permissive default: every party id resolves.
pub struct OpenPartyDirectory;

impl PartyDirectory for OpenPartyDirectory {
    fn exists(&self, _party_id: i64) -> RepositoryResult<bool> {
        Ok(true)
    }
}
