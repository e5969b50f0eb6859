mod config;
pub mod database;
pub mod history;

pub use config::{CalendarConfig, Config, ProfileConfig, ResolverConfig, RosterConfig};
pub use database::HistoryDb;
pub use history::{HistoryStore, MemoryHistory};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/stillokay[-dev]/` based on STILLOKAY_ENV.
///
/// Set STILLOKAY_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("STILLOKAY_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("stillokay-dev")
    } else {
        base_dir.join("stillokay")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
