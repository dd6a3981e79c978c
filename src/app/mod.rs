// ==========================================
// Application layer
// ==========================================
// Wires repositories, engines and APIs into one shared state.
// ==========================================

pub mod state;

pub use state::{get_default_db_path, AppState};
