// ==========================================
// API layer
// ==========================================
// Facade structs over the engines and repositories. Requests are
// validated here before any store access; engines enforce the
// store-backed rules.
// ==========================================

pub mod allocation_api;
pub mod error;
pub mod history_api;
pub mod transfer_api;
pub mod validator;

pub use allocation_api::AllocationApi;
pub use error::{ApiError, ApiResult};
pub use history_api::{
    CraneAvailability, CraneStatusView, FleetAvailability, FleetOverview, HistoryApi,
};
pub use transfer_api::TransferApi;
