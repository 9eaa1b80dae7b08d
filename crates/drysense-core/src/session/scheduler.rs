//! Recurring tick and health-check schedule over an injected clock.
//!
//! The scheduler only answers "what is due now"; running the jobs is the
//! caller's business. Jobs are returned one batch at a time, so at most one
//! tick is ever in flight per device.

use chrono::{DateTime, Duration, Utc};

/// Health checks run this often, or every tick if ticks are rarer.
const HEALTH_CHECK_EVERY_MIN: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Tick,
    HealthCheck,
}

#[derive(Debug, Clone)]
pub struct TickScheduler {
    tick_every: Duration,
    health_every: Duration,
    next_tick: DateTime<Utc>,
    next_health: DateTime<Utc>,
}

impl TickScheduler {
    /// First tick is due immediately; the first health check one period later.
    pub fn new(update_interval_min: u32, now: DateTime<Utc>) -> Self {
        let tick_every = Duration::minutes(i64::from(update_interval_min.max(1)));
        let health_every = Duration::minutes(HEALTH_CHECK_EVERY_MIN).max(tick_every);
        Self {
            tick_every,
            health_every,
            next_tick: now,
            next_health: now + health_every,
        }
    }

    pub fn tick_every(&self) -> Duration {
        self.tick_every
    }

    /// Jobs due at `now`, in execution order. Each due job is rescheduled one
    /// period after `now`, so a host that slept through several periods runs
    /// a job once rather than catching up.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        let mut jobs = Vec::new();
        if now >= self.next_tick {
            jobs.push(Job::Tick);
            self.next_tick = now + self.tick_every;
        }
        if now >= self.next_health {
            jobs.push(Job::HealthCheck);
            self.next_health = now + self.health_every;
        }
        jobs
    }

    /// Earliest instant anything is due.
    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_tick.min(self.next_health)
    }

    /// A forced refresh counts as this period's tick.
    pub fn tick_ran(&mut self, now: DateTime<Utc>) {
        self.next_tick = now + self.tick_every;
    }
}
