// Small dev utility: build a demo database with a few sites and
// cranes, one assignment and one transfer, so the query APIs have
// something to show.
//
// Usage:
//   cargo run --bin seed_demo_db -- [db_path]

use chrono::NaiveDate;

use crane_allocation::config::AppConfig;
use crane_allocation::domain::Crane;
use crane_allocation::engine::{AssignRequest, TransferRequest};
use crane_allocation::{logging, AppState};

fn main() -> anyhow::Result<()> {
    logging::init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "crane_allocation_demo.db".to_string());

    let state = AppState::new(db_path.clone(), &AppConfig::default())?;

    let harbor = state.site_repo.insert("Harbor Terminal", Some(101))?;
    let tower = state.site_repo.insert("Tower Block North", Some(102))?;
    let depot = state.site_repo.insert("Rail Depot Extension", None)?;

    state.crane_repo.insert(
        &Crane::new("TC-250-01".to_string(), "Liebherr 250 EC-B".to_string())
            .with_specs("250 EC-B", "Liebherr", 12.0),
    )?;
    state.crane_repo.insert(
        &Crane::new("TC-180-02".to_string(), "Potain MDT 219".to_string())
            .with_specs("MDT 219", "Potain", 10.0),
    )?;
    state
        .crane_repo
        .insert(&Crane::new("MC-500-03".to_string(), "Mobile crane 500t".to_string()))?;

    let allocation = state.allocation_api.assign(AssignRequest {
        crane_id: "TC-250-01".to_string(),
        site_id: harbor,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).ok_or_else(|| anyhow::anyhow!("bad date"))?,
        monthly_rate: Some(5000.0),
        notes: Some("Initial deployment".to_string()),
        responsible_party_id: Some(1),
    })?;
    println!("assigned TC-250-01 to harbor: allocation {}", allocation.id);

    let outcome = state.transfer_api.transfer(TransferRequest {
        crane_id: "TC-250-01".to_string(),
        origin_site_id: harbor,
        destination_site_id: tower,
        transfer_date: NaiveDate::from_ymd_opt(2024, 2, 16).ok_or_else(|| anyhow::anyhow!("bad date"))?,
        responsible_party_id: 1,
        reason: Some("Harbor phase complete".to_string()),
        monthly_rate_override: None,
    })?;
    println!(
        "transferred TC-250-01: origin allocation {} concluded, destination allocation {} active",
        outcome.origin.id, outcome.destination.id
    );

    state.allocation_api.assign(AssignRequest {
        crane_id: "TC-180-02".to_string(),
        site_id: depot,
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).ok_or_else(|| anyhow::anyhow!("bad date"))?,
        monthly_rate: Some(3800.0),
        notes: None,
        responsible_party_id: Some(2),
    })?;

    println!("demo database seeded at {}", db_path);
    Ok(())
}
