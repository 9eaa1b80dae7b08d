//! Core error types for drysense-core.
//!
//! Tick-level failures (`ConfigError`, `FetchError`) never escape the device:
//! they are folded into the status/reason attributes. `CoreError` is the
//! umbrella the storage and CLI layers propagate with `?`.

use std::path::PathBuf;
use thiserror::Error;

use crate::weather::Quantity;

/// Core error type for drysense-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Weather aggregation errors
    #[error("Weather error: {0}")]
    Weather(#[from] WeatherError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Weather fallback is needed but neither the device nor the hub has coordinates.
    #[error("no location configured for the weather fallback")]
    NoLocation,

    /// Required readings are missing and the remote fallback is switched off.
    #[error("no usable data source for {} (fallback disabled)", join_quantities(.missing))]
    NoUsableSource { missing: Vec<Quantity> },
}

/// Remote weather and aggregation failures.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("weather request failed: {0}")]
    Request(String),

    #[error("weather service returned HTTP {0}")]
    Status(u16),

    #[error("weather request timed out after {0}s")]
    Timeout(u64),

    #[error("weather payload is missing the current conditions block")]
    MalformedPayload,

    #[error(
        "missing {} after reading sensors (fallback attempted: {fallback_attempted})",
        join_quantities(.missing)
    )]
    MissingFields {
        missing: Vec<Quantity>,
        fallback_attempted: bool,
    },
}

/// Everything `WeatherAggregator::observe` can fail with.
#[derive(Error, Debug)]
pub enum WeatherError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl WeatherError {
    /// Short label used for the status attribute.
    pub fn kind(&self) -> &'static str {
        match self {
            WeatherError::Config(_) => "configuration",
            WeatherError::Fetch(_) => "fetch",
        }
    }
}

fn join_quantities(quantities: &[Quantity]) -> String {
    quantities
        .iter()
        .map(|q| q.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg)
                if e.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::MalformedPayload
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Request(err.to_string())
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
