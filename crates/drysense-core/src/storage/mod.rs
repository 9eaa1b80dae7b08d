mod config;
pub mod database;

pub use config::{Config, DeviceConfig, HubConfig, SensorsConfig, WeatherConfig};
pub use database::{Database, DryingRecord, DryingStats};

use std::path::PathBuf;

use crate::error::CoreError;

/// Returns the data directory, creating it if needed.
///
/// `DRYSENSE_HOME` wins when set. Otherwise `~/.config/drysense/`, or
/// `~/.config/drysense-dev/` with `DRYSENSE_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, CoreError> {
    let dir = match std::env::var_os("DRYSENSE_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("DRYSENSE_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("drysense-dev")
            } else {
                base_dir.join("drysense")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
