//! Status/reason classification for a drying tick.
//!
//! An ordered decision list: the first matching rule wins.

use serde::{Deserialize, Serialize};

use crate::model::LocationProfile;
use crate::weather::Observation;

pub const STALLED: &str = "Stalled";
pub const VERY_SLOW: &str = "Very slow";
pub const SLOW: &str = "Slow drying";
pub const MODERATE: &str = "Moderate drying";
pub const EXCELLENT: &str = "Excellent drying";
pub const FAST: &str = "Fast drying";

/// Short status label plus a human readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub reason: String,
}

impl StatusReport {
    pub fn new(status: &str, reason: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            reason: reason.into(),
        }
    }

    pub fn ready() -> Self {
        Self::new("Ready", "Waiting for a load to be hung out")
    }
}

impl Default for StatusReport {
    fn default() -> Self {
        Self::ready()
    }
}

/// Classify the conditions behind the current rate.
pub fn classify(obs: &Observation, smoothed_rate: f64, profile: LocationProfile) -> StatusReport {
    let rh = obs.humidity.value;
    let wind = obs.wind.value;
    let depression = obs.dew_point_depression();

    if obs.rain_rate() > 0.0 {
        return StatusReport::new(STALLED, "Rain detected, drying has stopped");
    }
    if let Some(d) = depression {
        if d < 2.0 {
            return StatusReport::new(
                STALLED,
                format!(
                    "Dew risk: only {d:.1}°C above the dew point, laundry may pick up moisture"
                ),
            );
        }
        if d < 5.0 {
            return StatusReport::new(VERY_SLOW, "Air is close to saturation");
        }
    }
    if rh >= 90.0 {
        return StatusReport::new(SLOW, format!("Very humid air ({rh:.0}% RH)"));
    }

    match profile {
        LocationProfile::Indoor => {
            if rh >= 70.0 {
                return StatusReport::new(SLOW, "Humid room, a dehumidifier would help");
            }
            if wind < 0.5 {
                return StatusReport::new(MODERATE, "Little airflow indoors, a fan would help");
            }
        }
        LocationProfile::FullShade => {
            if wind < 1.5 {
                return StatusReport::new(SLOW, "Shaded and calm");
            }
            if smoothed_rate < 0.10 {
                return StatusReport::new(SLOW, "Shade is limiting drying");
            }
        }
        LocationProfile::DirectSun | LocationProfile::PartialShade => {}
    }

    if wind < 1.0 {
        return StatusReport::new(MODERATE, "Calm air is slowing evaporation");
    }
    if profile == LocationProfile::DirectSun && obs.lux() < 10_000.0 {
        return StatusReport::new(MODERATE, "Overcast, little sun reaching the line");
    }
    if smoothed_rate < 0.15 {
        return StatusReport::new(MODERATE, "Fair drying conditions");
    }
    if depression.is_some_and(|d| d >= 12.0) {
        return StatusReport::new(EXCELLENT, "Warm, dry air");
    }
    StatusReport::new(FAST, "Good drying conditions")
}
