//! One drying installation: weather sources, session and clock wired together.
//!
//! The device owns no threads. A host drives it either by calling
//! [`DryerDevice::tick`] and [`DryerDevice::health_check`] itself, or by
//! handing it a [`TickScheduler`] through [`DryerDevice::run_due`].

use chrono::Duration;

use crate::events::Event;
use crate::session::{Attributes, Clock, DryingSession, Job, SessionSettings, TickScheduler};
use crate::weather::{RemoteWeather, SensorReader, WeatherAggregator};

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSettings {
    pub session: SessionSettings,
    /// Sensor readings older than this are ignored.
    pub stale_after_min: u32,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            session: SessionSettings::default(),
            stale_after_min: 20,
        }
    }
}

impl DeviceSettings {
    pub fn max_sensor_age(&self) -> Duration {
        Duration::minutes(i64::from(self.stale_after_min))
    }
}

pub struct DryerDevice<S, R, C> {
    settings: DeviceSettings,
    weather: WeatherAggregator<S, R>,
    session: DryingSession,
    clock: C,
}

impl<S: SensorReader, R: RemoteWeather, C: Clock> DryerDevice<S, R, C> {
    pub fn new(settings: DeviceSettings, weather: WeatherAggregator<S, R>, clock: C) -> Self {
        Self::with_session(settings, weather, clock, DryingSession::new())
    }

    /// Continue from a persisted session.
    pub fn with_session(
        settings: DeviceSettings,
        weather: WeatherAggregator<S, R>,
        clock: C,
        session: DryingSession,
    ) -> Self {
        Self {
            settings,
            weather,
            session,
            clock,
        }
    }

    pub fn settings(&self) -> &DeviceSettings {
        &self.settings
    }

    pub fn session(&self) -> &DryingSession {
        &self.session
    }

    pub fn into_session(self) -> DryingSession {
        self.session
    }

    /// Swap in a session persisted elsewhere, returning the current one.
    pub fn restore(&mut self, session: DryingSession) -> DryingSession {
        std::mem::replace(&mut self.session, session)
    }

    pub fn weather(&self) -> &WeatherAggregator<S, R> {
        &self.weather
    }

    pub fn weather_mut(&mut self) -> &mut WeatherAggregator<S, R> {
        &mut self.weather
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self) -> Option<Event> {
        self.session.start(self.clock.now())
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.session.pause(self.clock.now())
    }

    pub fn resume(&mut self) -> Option<Event> {
        self.session.resume(self.clock.now())
    }

    pub fn mark_dry(&mut self) -> Option<Event> {
        self.session.mark_dry(self.clock.now())
    }

    pub fn reset(&mut self) -> Option<Event> {
        self.session.reset(self.clock.now())
    }

    pub fn reset_calibration(&mut self) -> Option<Event> {
        self.session.reset_calibration(self.clock.now())
    }

    // ── Ticks ────────────────────────────────────────────────────────

    /// Resolve the weather and advance the session. Only runs while Drying.
    pub fn tick(&mut self) -> Option<Event> {
        if self.session.state() != crate::session::SessionState::Drying {
            return None;
        }
        let now = self.clock.now();
        match self.weather.observe(self.settings.max_sensor_age(), now) {
            Ok(obs) => self.session.apply_observation(&obs, &self.settings.session, now),
            Err(e) => {
                tracing::warn!(kind = e.kind(), "weather update failed: {e}");
                self.session.record_failure(&e, now)
            }
        }
    }

    /// Immediate tick that also counts as the scheduler's current period.
    pub fn refresh(&mut self, scheduler: &mut TickScheduler) -> Option<Event> {
        let event = self.tick();
        scheduler.tick_ran(self.clock.now());
        event
    }

    pub fn health_check(&mut self) -> Option<Event> {
        self.session
            .health_check(&self.settings.session, self.clock.now())
    }

    pub fn attributes(&self) -> Attributes {
        Attributes::from_session(&self.session, self.clock.now())
    }

    /// Run whatever the scheduler says is due now.
    pub fn run_due(&mut self, scheduler: &mut TickScheduler) -> Vec<Event> {
        scheduler
            .due(self.clock.now())
            .into_iter()
            .filter_map(|job| match job {
                Job::Tick => self.tick(),
                Job::HealthCheck => self.health_check(),
            })
            .collect()
    }
}
