// ==========================================
// Crane Allocation Ledger - SQLite connection setup
// ==========================================
// Goals:
// - One place for Connection::open + PRAGMA, so every module gets the
//   same foreign_keys / busy_timeout behavior
// - Embedded schema init shared by the service, the maintenance
//   binaries and the test helpers
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// Default busy_timeout (milliseconds)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Apply the unified PRAGMA set to a connection.
///
/// foreign_keys and busy_timeout are per-connection settings in SQLite,
/// so this must run on every connection we open.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open a SQLite connection with the unified configuration applied.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Create the allocation-ledger schema if it does not exist yet.
///
/// The partial unique index on `allocations` is the actual enforcement of
/// the one-Active-allocation-per-crane rule. The application-level check
/// in the engine exists only to return a friendly conflict message; a
/// concurrent assign that slips past it is stopped here.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sites (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            client_id   INTEGER,
            status      TEXT NOT NULL DEFAULT 'Active',
            created_at  TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS cranes (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            model           TEXT,
            manufacturer    TEXT,
            capacity_t      REAL,
            status          TEXT NOT NULL DEFAULT 'Available'
                            CHECK (status IN ('Available', 'Allocated', 'InMaintenance')),
            current_site_id INTEGER REFERENCES sites(id),
            created_at      TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS allocations (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            crane_id     TEXT NOT NULL REFERENCES cranes(id),
            site_id      INTEGER NOT NULL REFERENCES sites(id),
            start_date   TEXT NOT NULL,
            end_date     TEXT,
            monthly_rate REAL,
            status       TEXT NOT NULL DEFAULT 'Active'
                         CHECK (status IN ('Active', 'Concluded', 'Suspended')),
            notes        TEXT,
            created_at   TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_allocations_single_active
            ON allocations(crane_id) WHERE status = 'Active';

        CREATE INDEX IF NOT EXISTS idx_allocations_site
            ON allocations(site_id, status);

        CREATE TABLE IF NOT EXISTS allocation_history (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id             TEXT NOT NULL UNIQUE,
            crane_id             TEXT NOT NULL,
            site_id              INTEGER NOT NULL,
            start_date           TEXT NOT NULL,
            end_date             TEXT,
            responsible_party_id INTEGER,
            operation_type       TEXT NOT NULL
                                 CHECK (operation_type IN ('Start', 'Transfer', 'End', 'Pause', 'Resume')),
            rate                 REAL,
            notes                TEXT,
            created_at           TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_history_crane
            ON allocation_history(crane_id, id);
        "#,
    )
}
