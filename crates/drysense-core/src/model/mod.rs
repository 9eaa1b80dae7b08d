//! The drying model: evaporation scoring, rate smoothing and calibration.

mod calibration;
mod evaporation;
mod smoother;

pub use calibration::{CalibrationLearner, MAX_FACTOR, MIN_FACTOR};
pub use evaporation::{evaporation_power, LocationProfile, FULL_SUN_LUX};
pub use smoother::{instantaneous_rate, smooth_rate, DryingSpeed, REFERENCE_POWER};

/// Round a minute count up, ignoring float noise below a nanominute so that
/// `80.00000000000001` stays 80.
pub(crate) fn whole_minutes_up(minutes: f64) -> u32 {
    ((minutes * 1e9).round() / 1e9).ceil() as u32
}
