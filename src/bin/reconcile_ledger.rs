// Small dev utility: run a reconciliation sweep against a database and
// print the report.
//
// Usage:
//   cargo run --bin reconcile_ledger -- [db_path] [--strict]
//
// --strict exits non-zero when any anomaly is found.

use crane_allocation::app::get_default_db_path;
use crane_allocation::config::AppConfig;
use crane_allocation::{logging, AppState};

fn main() -> anyhow::Result<()> {
    logging::init();

    let mut db_path: Option<String> = None;
    let mut strict = false;
    for arg in std::env::args().skip(1) {
        if arg == "--strict" {
            strict = true;
        } else {
            db_path = Some(arg);
        }
    }
    let db_path = db_path.unwrap_or_else(get_default_db_path);

    let state = AppState::new(db_path, &AppConfig::default())?;
    let report = state.reconciliation_engine.run()?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if strict && !report.is_clean() {
        std::process::exit(1);
    }
    Ok(())
}
