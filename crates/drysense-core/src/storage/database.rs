//! SQLite-based state and drying history.
//!
//! Provides persistent storage for:
//! - Completed drying sessions (predicted vs actual duration)
//! - History statistics
//! - Key-value store for application state (the serialized session)

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::DatabaseError;
use crate::events::Event;

/// One completed drying session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryingRecord {
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    pub predicted_min: Option<u32>,
    pub actual_min: f64,
    pub marked_by_user: bool,
    pub calibrated: bool,
    pub calibration_factor: f64,
}

impl DryingRecord {
    /// Build a record from a completion event; other events yield `None`.
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::SessionCompleted {
                session_id,
                started_at,
                predicted_min,
                actual_min,
                marked_by_user,
                calibrated,
                calibration_factor,
                at,
                ..
            } => Some(Self {
                session_id: session_id.map(|id| id.to_string()),
                started_at: *started_at,
                completed_at: *at,
                predicted_min: *predicted_min,
                actual_min: *actual_min,
                marked_by_user: *marked_by_user,
                calibrated: *calibrated,
                calibration_factor: *calibration_factor,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DryingStats {
    pub total_sessions: u64,
    pub marked_by_user: u64,
    pub calibrated: u64,
    /// Mean actual duration in minutes, 0 when empty.
    pub mean_actual_min: f64,
}

/// SQLite database for drying history and state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open the database at `~/.config/drysense/drysense.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Self::open_at(&dir.join("drysense.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), DatabaseError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS drying_log (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id      TEXT,
                started_at      TEXT,
                completed_at    TEXT NOT NULL,
                predicted_min   INTEGER,
                actual_min      REAL NOT NULL,
                marked_by_user  INTEGER NOT NULL,
                calibrated      INTEGER NOT NULL,
                factor_after    REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_drying_log_completed_at ON drying_log(completed_at);",
        )?;
        Ok(())
    }

    /// Append a completed session.
    pub fn record_drying(&self, record: &DryingRecord) -> Result<i64, DatabaseError> {
        self.conn.execute(
            "INSERT INTO drying_log (session_id, started_at, completed_at, predicted_min,
                                     actual_min, marked_by_user, calibrated, factor_after)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.session_id,
                record.started_at.map(|t| t.to_rfc3339()),
                record.completed_at.to_rfc3339(),
                record.predicted_min,
                record.actual_min,
                record.marked_by_user,
                record.calibrated,
                record.calibration_factor,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first.
    pub fn history(&self, limit: usize) -> Result<Vec<DryingRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, started_at, completed_at, predicted_min, actual_min,
                    marked_by_user, calibrated, factor_after
             FROM drying_log ORDER BY completed_at DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let started_at: Option<String> = row.get(1)?;
            let completed_at: String = row.get(2)?;
            Ok(DryingRecord {
                session_id: row.get(0)?,
                started_at: started_at.as_deref().and_then(parse_time),
                completed_at: parse_time(&completed_at).unwrap_or_default(),
                predicted_min: row.get(3)?,
                actual_min: row.get(4)?,
                marked_by_user: row.get(5)?,
                calibrated: row.get(6)?,
                calibration_factor: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn stats(&self) -> Result<DryingStats, DatabaseError> {
        let stats = self.conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(marked_by_user), 0),
                    COALESCE(SUM(calibrated), 0),
                    COALESCE(AVG(actual_min), 0.0)
             FROM drying_log",
            [],
            |row| {
                Ok(DryingStats {
                    total_sessions: row.get::<_, i64>(0)? as u64,
                    marked_by_user: row.get::<_, i64>(1)? as u64,
                    calibrated: row.get::<_, i64>(2)? as u64,
                    mean_actual_min: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?)
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), DatabaseError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
