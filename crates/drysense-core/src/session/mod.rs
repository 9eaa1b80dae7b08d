mod attributes;
mod clock;
mod engine;
mod scheduler;
pub mod status;

pub use attributes::{format_minutes, Attributes};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{DryingSession, SessionSettings, SessionState, WeatherStatus};
pub use scheduler::{Job, TickScheduler};
pub use status::StatusReport;
