//! # DrySense Core Library
//!
//! Estimates how far along a load of laundry hung outdoors (or indoors) is,
//! and when it will be dry, from live weather. The CLI binary is a thin
//! layer over this library.
//!
//! ## Architecture
//!
//! - **Weather**: Merges bound sensor readings with an Open-Meteo fallback
//!   into one [`Observation`] per tick
//! - **Model**: Evaporation power, rate smoothing and the per-installation
//!   calibration learner
//! - **Session**: A wall-clock-based state machine that requires the caller
//!   to periodically invoke `tick()` for progress updates
//! - **Storage**: SQLite-based state and history, TOML-based configuration
//!
//! ## Key Components
//!
//! - [`DryerDevice`]: Orchestrates weather, session and clock
//! - [`DryingSession`]: Core session state machine
//! - [`Database`]: Session persistence and drying history
//! - [`Config`]: Application configuration management

pub mod device;
pub mod error;
pub mod events;
pub mod model;
pub mod session;
pub mod storage;
pub mod weather;

pub use device::{DeviceSettings, DryerDevice};
pub use error::{ConfigError, CoreError, DatabaseError, FetchError, WeatherError};
pub use events::Event;
pub use model::{CalibrationLearner, DryingSpeed, LocationProfile};
pub use session::{
    Attributes, Clock, DryingSession, ManualClock, SessionSettings, SessionState, SystemClock,
    TickScheduler, WeatherStatus,
};
pub use storage::{Config, Database, DryingRecord};
pub use weather::{Observation, WeatherAggregator};
