// ==========================================
// Transfer API
// ==========================================

use std::sync::Arc;
use tracing::debug;

use crate::api::error::ApiResult;
use crate::api::validator;
use crate::engine::{TransferCoordinator, TransferOutcome, TransferRequest};

pub struct TransferApi {
    coordinator: Arc<TransferCoordinator>,
}

impl TransferApi {
    pub fn new(coordinator: Arc<TransferCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Move a crane's Active allocation to a new site in one unit of
    /// work. The origin ends and the destination starts on the
    /// transfer date, back to back.
    pub fn transfer(&self, req: TransferRequest) -> ApiResult<TransferOutcome> {
        validator::validate_transfer(&req)?;
        debug!(
            crane_id = %req.crane_id,
            origin = req.origin_site_id,
            destination = req.destination_site_id,
            "transfer requested"
        );
        self.coordinator.transfer(&req)
    }
}
