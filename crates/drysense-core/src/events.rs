use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::SessionState;

/// Every state change of a drying device produces an Event.
/// The CLI prints them; hosts forward them to their dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    SessionPaused {
        percent_dry: u8,
        at: DateTime<Utc>,
    },
    SessionResumed {
        percent_dry: u8,
        at: DateTime<Utc>,
    },
    /// A tick advanced the session.
    TickApplied {
        percent_dry: u8,
        evaporation_power: f64,
        smoothed_rate: f64,
        eta_min: Option<u32>,
        status: String,
        at: DateTime<Utc>,
    },
    /// A tick could not resolve the weather; progress is unchanged.
    TickFailed {
        kind: String,
        message: String,
        at: DateTime<Utc>,
    },
    /// The session reached Done, by reaching 100% or by the user marking it dry.
    SessionCompleted {
        session_id: Option<Uuid>,
        started_at: Option<DateTime<Utc>>,
        percent_dry: u8,
        predicted_min: Option<u32>,
        actual_min: f64,
        marked_by_user: bool,
        /// Whether the outcome was folded into the calibration.
        calibrated: bool,
        calibration_factor: f64,
        at: DateTime<Utc>,
    },
    SessionReset {
        previous: SessionState,
        at: DateTime<Utc>,
    },
    CalibrationReset {
        at: DateTime<Utc>,
    },
    /// Health check found no successful update for too long.
    WeatherStale {
        minutes_since_update: i64,
        at: DateTime<Utc>,
    },
}
