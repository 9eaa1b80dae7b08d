//! Drying session state machine.
//!
//! Like the rest of the core it owns no threads: the host calls
//! [`DryingSession::apply_observation`] (through the device) on every
//! scheduled tick and passes the current time in.
//!
//! ## State Transitions
//!
//! ```text
//! Ready -> Drying -> (Paused | Done) -> Ready
//!            ^         |
//!            +---------+  start (restart) / resume (keep progress)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{classify, StatusReport};
use crate::error::WeatherError;
use crate::events::Event;
use crate::model::{
    evaporation_power, smooth_rate, whole_minutes_up, CalibrationLearner, DryingSpeed,
    LocationProfile,
};
use crate::weather::Observation;

/// Below this smoothed rate the ETA is unknown.
const MIN_RATE_FOR_ETA: f64 = 0.0001;

/// Initial ETA is only captured while the load is still mostly wet.
const INITIAL_ETA_MAX_PERCENT: u8 = 10;

/// Health check threshold floor.
const MIN_STALE_MINUTES: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Ready,
    Drying,
    Paused,
    Done,
}

/// Freshness of the weather feeding the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WeatherStatus {
    Ok,
    Stale,
    Error,
}

/// Per-installation parameters a tick needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Minutes between scheduled ticks, 1..=60.
    pub update_interval_min: u32,
    pub profile: LocationProfile,
    pub speed: DryingSpeed,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            update_interval_min: 5,
            profile: LocationProfile::default(),
            speed: DryingSpeed::default(),
        }
    }
}

impl SessionSettings {
    /// Silence after which the health check flags the weather as stale.
    pub fn stale_threshold(&self) -> Duration {
        Duration::minutes((3 * i64::from(self.update_interval_min)).max(MIN_STALE_MINUTES))
    }
}

/// One drying cycle plus the calibration that outlives it.
///
/// Serializable so a host can persist it between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DryingSession {
    state: SessionState,
    #[serde(default)]
    session_id: Option<Uuid>,
    percent_dry: u8,
    /// EMA of the drying rate, fraction per hour.
    smoothed_rate: f64,
    started_at: Option<DateTime<Utc>>,
    /// Raw ETA captured on the first usable tick, fed to calibration.
    initial_eta_min: Option<u32>,
    /// Last successful tick.
    last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    resumed_at: Option<DateTime<Utc>>,
    raw_eta_min: Option<u32>,
    eta_min: Option<u32>,
    #[serde(default)]
    evaporation_power: f64,
    status: StatusReport,
    weather_status: WeatherStatus,
    #[serde(default)]
    last_observation: Option<Observation>,
    #[serde(default)]
    calibration: CalibrationLearner,
}

impl Default for DryingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DryingSession {
    pub fn new() -> Self {
        Self::with_calibration(CalibrationLearner::default())
    }

    pub fn with_calibration(calibration: CalibrationLearner) -> Self {
        Self {
            state: SessionState::Ready,
            session_id: None,
            percent_dry: 0,
            smoothed_rate: 0.0,
            started_at: None,
            initial_eta_min: None,
            last_update: None,
            resumed_at: None,
            raw_eta_min: None,
            eta_min: None,
            evaporation_power: 0.0,
            status: StatusReport::ready(),
            weather_status: WeatherStatus::Ok,
            last_observation: None,
            calibration,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn percent_dry(&self) -> u8 {
        self.percent_dry
    }

    pub fn smoothed_rate(&self) -> f64 {
        self.smoothed_rate
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn initial_eta_min(&self) -> Option<u32> {
        self.initial_eta_min
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn raw_eta_min(&self) -> Option<u32> {
        self.raw_eta_min
    }

    /// Calibrated ETA.
    pub fn eta_min(&self) -> Option<u32> {
        self.eta_min
    }

    pub fn evaporation_power(&self) -> f64 {
        self.evaporation_power
    }

    pub fn status(&self) -> &StatusReport {
        &self.status
    }

    pub fn weather_status(&self) -> WeatherStatus {
        self.weather_status
    }

    pub fn last_observation(&self) -> Option<&Observation> {
        self.last_observation.as_ref()
    }

    pub fn calibration(&self) -> &CalibrationLearner {
        &self.calibration
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at
            .map(|start| now.signed_duration_since(start).max(Duration::zero()))
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin a fresh cycle. Progress always restarts from 0%, including
    /// when coming from Paused; use [`resume`](Self::resume) to keep it.
    pub fn start(&mut self, now: DateTime<Utc>) -> Option<Event> {
        match self.state {
            SessionState::Ready | SessionState::Paused | SessionState::Done => {
                let session_id = Uuid::new_v4();
                self.clear_progress();
                self.state = SessionState::Drying;
                self.session_id = Some(session_id);
                self.started_at = Some(now);
                self.status = StatusReport::new("Drying", "Waiting for the first weather update");
                tracing::info!(%session_id, "drying session started");
                Some(Event::SessionStarted {
                    session_id,
                    at: now,
                })
            }
            SessionState::Drying => None, // Already drying.
        }
    }

    pub fn pause(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Drying {
            return None;
        }
        self.state = SessionState::Paused;
        self.status = StatusReport::new("Paused", format!("Paused at {}%", self.percent_dry));
        tracing::info!(percent = self.percent_dry, "drying session paused");
        Some(Event::SessionPaused {
            percent_dry: self.percent_dry,
            at: now,
        })
    }

    /// Continue a paused cycle without losing progress.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Paused {
            return None;
        }
        self.state = SessionState::Drying;
        self.resumed_at = Some(now);
        self.status = StatusReport::new("Drying", "Resumed, waiting for the next weather update");
        tracing::info!(percent = self.percent_dry, "drying session resumed");
        Some(Event::SessionResumed {
            percent_dry: self.percent_dry,
            at: now,
        })
    }

    /// The user reports the laundry dry: learn from the elapsed time and finish.
    pub fn mark_dry(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Drying {
            return None;
        }
        let actual_min = self
            .elapsed(now)
            .map(|d| d.num_seconds() as f64 / 60.0)
            .unwrap_or(0.0);

        let before = self.calibration.session_count();
        if let Some(predicted) = self.initial_eta_min {
            self.calibration
                .record_outcome(f64::from(predicted), actual_min);
        }
        let calibrated = self.calibration.session_count() > before;
        if calibrated {
            tracing::info!(
                factor = self.calibration.factor(),
                sessions = self.calibration.session_count(),
                "calibration updated"
            );
        } else {
            tracing::debug!(
                predicted = ?self.initial_eta_min,
                actual_min,
                "outcome not used for calibration"
            );
        }

        Some(self.finish(now, actual_min, true, calibrated))
    }

    /// Back to Ready. Calibration is kept.
    pub fn reset(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let previous = self.state;
        self.clear_progress();
        self.state = SessionState::Ready;
        self.session_id = None;
        self.started_at = None;
        self.status = StatusReport::ready();
        self.weather_status = WeatherStatus::Ok;
        self.last_observation = None;
        tracing::info!(?previous, "drying session reset");
        Some(Event::SessionReset { previous, at: now })
    }

    pub fn reset_calibration(&mut self, now: DateTime<Utc>) -> Option<Event> {
        self.calibration.reset();
        tracing::info!("calibration reset");
        Some(Event::CalibrationReset { at: now })
    }

    // ── Ticks ────────────────────────────────────────────────────────

    /// Advance the session with a resolved observation.
    ///
    /// Returns `None` outside of Drying.
    pub fn apply_observation(
        &mut self,
        obs: &Observation,
        settings: &SessionSettings,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        if self.state != SessionState::Drying {
            return None;
        }

        let power = evaporation_power(obs, settings.profile);
        self.smoothed_rate = smooth_rate(self.smoothed_rate, power, settings.speed);
        self.evaporation_power = power;

        let hours = f64::from(settings.update_interval_min) / 60.0;
        let gained = (self.smoothed_rate * hours * 100.0).round();
        self.percent_dry = (f64::from(self.percent_dry) + gained).clamp(0.0, 100.0) as u8;

        self.raw_eta_min = raw_eta(self.percent_dry, self.smoothed_rate);
        if self.initial_eta_min.is_none() && self.percent_dry < INITIAL_ETA_MAX_PERCENT {
            self.initial_eta_min = self.raw_eta_min;
        }
        self.eta_min = self.calibration.apply_to(self.raw_eta_min);

        self.last_update = Some(now);
        self.weather_status = WeatherStatus::Ok;
        self.last_observation = Some(obs.clone());
        self.status = classify(obs, self.smoothed_rate, settings.profile);

        tracing::debug!(
            power,
            rate = self.smoothed_rate,
            percent = self.percent_dry,
            eta = ?self.eta_min,
            status = %self.status.status,
            "tick applied"
        );

        if self.percent_dry >= 100 {
            let actual_min = self
                .elapsed(now)
                .map(|d| d.num_seconds() as f64 / 60.0)
                .unwrap_or(0.0);
            return Some(self.finish(now, actual_min, false, false));
        }

        Some(Event::TickApplied {
            percent_dry: self.percent_dry,
            evaporation_power: power,
            smoothed_rate: self.smoothed_rate,
            eta_min: self.eta_min,
            status: self.status.status.clone(),
            at: now,
        })
    }

    /// Record a failed tick. Progress, rate and calibration are untouched.
    pub fn record_failure(&mut self, err: &WeatherError, now: DateTime<Utc>) -> Option<Event> {
        if self.state != SessionState::Drying {
            return None;
        }
        self.weather_status = WeatherStatus::Error;
        self.status = StatusReport::new("Error", err.to_string());
        Some(Event::TickFailed {
            kind: err.kind().to_string(),
            message: err.to_string(),
            at: now,
        })
    }

    /// Flag the weather as stale when no tick has succeeded for
    /// `max(3 x interval, 2 min)`. Progress is not touched.
    pub fn health_check(
        &mut self,
        settings: &SessionSettings,
        now: DateTime<Utc>,
    ) -> Option<Event> {
        if self.state != SessionState::Drying {
            return None;
        }
        let anchor = [self.last_update, self.resumed_at, self.started_at]
            .into_iter()
            .flatten()
            .max()?;
        let silent = now.signed_duration_since(anchor);
        if silent <= settings.stale_threshold() {
            return None;
        }
        let minutes = silent.num_minutes();
        self.weather_status = WeatherStatus::Stale;
        self.status = StatusReport::new("Warning", format!("No weather update for {minutes} min"));
        tracing::warn!(minutes, "weather data is stale");
        Some(Event::WeatherStale {
            minutes_since_update: minutes,
            at: now,
        })
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn clear_progress(&mut self) {
        self.percent_dry = 0;
        self.smoothed_rate = 0.0;
        self.initial_eta_min = None;
        self.last_update = None;
        self.resumed_at = None;
        self.raw_eta_min = None;
        self.eta_min = None;
        self.evaporation_power = 0.0;
    }

    fn finish(
        &mut self,
        now: DateTime<Utc>,
        actual_min: f64,
        marked_by_user: bool,
        calibrated: bool,
    ) -> Event {
        self.state = SessionState::Done;
        self.raw_eta_min = Some(0);
        self.eta_min = Some(0);
        let reason = if marked_by_user {
            "Marked dry"
        } else {
            "Estimated fully dry"
        };
        self.status = StatusReport::new("Dry", reason);
        tracing::info!(actual_min, marked_by_user, "drying session completed");
        Event::SessionCompleted {
            session_id: self.session_id,
            started_at: self.started_at,
            percent_dry: self.percent_dry,
            predicted_min: self.initial_eta_min,
            actual_min,
            marked_by_user,
            calibrated,
            calibration_factor: self.calibration.factor(),
            at: now,
        }
    }
}

/// Minutes until 100% at `rate`, or `None` when the rate is effectively zero.
fn raw_eta(percent_dry: u8, rate: f64) -> Option<u32> {
    if rate <= MIN_RATE_FOR_ETA {
        return None;
    }
    let remaining = f64::from(100 - percent_dry.min(100)) / 100.0;
    Some(whole_minutes_up(remaining / rate * 60.0))
}
