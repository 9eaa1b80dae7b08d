//! Dashboard-facing snapshot of a device.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::engine::{DryingSession, SessionState, WeatherStatus};

/// Everything a dashboard shows for one installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub state: SessionState,
    pub percent_dry: u8,
    /// Fraction per hour, 4 decimals.
    pub smoothed_rate: f64,
    pub raw_eta_min: Option<u32>,
    pub eta_min: Option<u32>,
    pub eta_display: String,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub elapsed_min: Option<i64>,
    pub elapsed_display: String,
    pub conditions: String,
    pub status: String,
    pub reason: String,
    pub calibration_factor: f64,
    pub learning_status: String,
    pub last_update: Option<DateTime<Utc>>,
    pub weather_status: WeatherStatus,
}

impl Attributes {
    pub fn from_session(session: &DryingSession, now: DateTime<Utc>) -> Self {
        let elapsed = match session.state() {
            SessionState::Ready => None,
            _ => session.elapsed(now),
        };
        let estimated_completion = match session.state() {
            SessionState::Drying => session.eta_min().map(|eta| {
                session.last_update().unwrap_or(now) + Duration::minutes(i64::from(eta))
            }),
            _ => None,
        };
        let calibration = session.calibration();

        Self {
            state: session.state(),
            percent_dry: session.percent_dry(),
            smoothed_rate: (session.smoothed_rate() * 10_000.0).round() / 10_000.0,
            raw_eta_min: session.raw_eta_min(),
            eta_min: session.eta_min(),
            eta_display: format_minutes(session.eta_min()),
            estimated_completion,
            elapsed_min: elapsed.map(|d| d.num_minutes()),
            elapsed_display: format_minutes(elapsed.map(|d| d.num_minutes().max(0) as u32)),
            conditions: session
                .last_observation()
                .map(|obs| obs.summary())
                .unwrap_or_else(|| "No observation yet".to_string()),
            status: session.status().status.clone(),
            reason: session.status().reason.clone(),
            calibration_factor: (calibration.factor() * 1000.0).round() / 1000.0,
            learning_status: calibration.learning_status(),
            last_update: session.last_update(),
            weather_status: session.weather_status(),
        }
    }
}

/// `"2h 05m"`, `"45m"`, or `"unknown"`.
pub fn format_minutes(minutes: Option<u32>) -> String {
    match minutes {
        None => "unknown".to_string(),
        Some(m) if m < 60 => format!("{m}m"),
        Some(m) => format!("{}h {:02}m", m / 60, m % 60),
    }
}
