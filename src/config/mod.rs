// ==========================================
// Application configuration
// ==========================================
// A small JSON file next to the database, every field optional.
// Missing file means defaults.
// ==========================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::engine::transfer::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Overrides the platform default database location when set.
    pub db_path: Option<String>,
    /// Retry bound for transfers hitting a busy database.
    pub transfer_max_attempts: u32,
    /// Default page size for ledger queries with no explicit limit.
    pub default_history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            transfer_max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_history_limit: 100,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file, falling back to defaults when the file
    /// does not exist. A present but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("malformed config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "config loaded");
        Ok(config)
    }
}
