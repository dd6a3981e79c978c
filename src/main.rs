// ==========================================
// Service entry point
// ==========================================
// Boots the application state, applies the schema, and runs a
// reconciliation sweep so ledger divergence is visible at startup.
// ==========================================

use anyhow::Result;

use crane_allocation::app::{get_default_db_path, AppState};
use crane_allocation::config::AppConfig;
use crane_allocation::{logging, APP_NAME, VERSION};

fn main() -> Result<()> {
    logging::init();
    tracing::info!(version = VERSION, "{} starting", APP_NAME);

    let config_path = std::path::PathBuf::from(
        std::env::var("CRANE_ALLOCATION_CONFIG").unwrap_or_else(|_| "./crane_allocation.json".to_string()),
    );
    let config = AppConfig::load(&config_path)?;

    let db_path = config
        .db_path
        .clone()
        .unwrap_or_else(get_default_db_path);
    let state = AppState::new(db_path, &config)?;

    let report = state.reconciliation_engine.run()?;
    if report.is_clean() {
        tracing::info!(cranes = report.checked_cranes, "ledger consistent");
    } else {
        tracing::warn!(
            cranes = report.checked_cranes,
            anomalies = report.anomalies.len(),
            "ledger anomalies found, see warnings above"
        );
    }

    let overview = state.history_api.fleet_overview()?;
    tracing::info!(
        total = overview.total_cranes,
        available = overview.available,
        allocated = overview.allocated,
        in_maintenance = overview.in_maintenance,
        "fleet overview"
    );

    Ok(())
}
