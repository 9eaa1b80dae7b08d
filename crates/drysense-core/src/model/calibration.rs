//! Per-installation ETA calibration learned from completed sessions.

use serde::{Deserialize, Serialize};

use super::whole_minutes_up;

pub const MIN_FACTOR: f64 = 0.33;
pub const MAX_FACTOR: f64 = 3.0;

/// Weight of the newest session in the running factor.
const LEARNING_WEIGHT: f64 = 0.3;

/// Completions faster than this are treated as accidental.
const MIN_ACTUAL_MINUTES: f64 = 5.0;

/// Sessions before the factor is reported as calibrated.
const CALIBRATED_AFTER: u32 = 3;

/// Learned multiplier applied to raw ETAs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredCalibration")]
pub struct CalibrationLearner {
    factor: f64,
    session_count: u32,
}

/// Persisted shape; loading goes through [`CalibrationLearner::from_parts`].
#[derive(Deserialize)]
struct StoredCalibration {
    #[serde(default = "default_factor")]
    factor: f64,
    #[serde(default)]
    session_count: u32,
}

fn default_factor() -> f64 {
    1.0
}

impl From<StoredCalibration> for CalibrationLearner {
    fn from(stored: StoredCalibration) -> Self {
        Self::from_parts(stored.factor, stored.session_count)
    }
}

impl Default for CalibrationLearner {
    fn default() -> Self {
        Self {
            factor: 1.0,
            session_count: 0,
        }
    }
}

impl CalibrationLearner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore persisted state; the factor is clamped back into range.
    pub fn from_parts(factor: f64, session_count: u32) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(MIN_FACTOR, MAX_FACTOR)
        } else {
            1.0
        };
        Self {
            factor,
            session_count,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    /// Fold one (predicted, actual) pair into the factor and return it.
    ///
    /// Ignored unless `predicted > 0` and `actual > 5` minutes.
    pub fn record_outcome(&mut self, predicted_minutes: f64, actual_minutes: f64) -> f64 {
        if !(predicted_minutes > 0.0 && actual_minutes > MIN_ACTUAL_MINUTES) {
            return self.factor;
        }
        let session = (actual_minutes / predicted_minutes).clamp(MIN_FACTOR, MAX_FACTOR);
        self.factor = (self.factor * (1.0 - LEARNING_WEIGHT) + session * LEARNING_WEIGHT)
            .clamp(MIN_FACTOR, MAX_FACTOR);
        self.session_count += 1;
        self.factor
    }

    /// Calibrated ETA in whole minutes (rounded up). Unknown stays unknown.
    pub fn apply_to(&self, raw_eta_minutes: Option<u32>) -> Option<u32> {
        raw_eta_minutes.map(|raw| whole_minutes_up(f64::from(raw) * self.factor))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn learning_status(&self) -> String {
        match self.session_count {
            0 => "Learning (no completed sessions yet)".to_string(),
            n if n < CALIBRATED_AFTER => format!(
                "Learning ({n} session{})",
                if n == 1 { "" } else { "s" }
            ),
            n => format!("Calibrated over {n} sessions (x{:.2})", self.factor),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn slower_than_predicted_raises_factor() {
        let mut cal = CalibrationLearner::new();
        let factor = cal.record_outcome(120.0, 150.0);
        assert!((factor - 1.075).abs() < 1e-12);
        assert_eq!(cal.session_count(), 1);
    }

    #[test]
    fn implausible_outcomes_are_ignored() {
        let mut cal = CalibrationLearner::from_parts(1.2, 4);
        cal.record_outcome(0.0, 90.0);
        cal.record_outcome(60.0, 5.0);
        cal.record_outcome(-3.0, 40.0);
        assert_eq!(cal, CalibrationLearner::from_parts(1.2, 4));
    }

    #[test]
    fn single_outlier_is_bounded() {
        let mut cal = CalibrationLearner::new();
        cal.record_outcome(10.0, 10_000.0);
        // Session factor clamps to 3.0 before blending.
        assert!((cal.factor() - 1.6).abs() < 1e-12);
    }

    #[test]
    fn apply_rounds_up_and_keeps_unknown() {
        let cal = CalibrationLearner::from_parts(1.075, 1);
        assert_eq!(cal.apply_to(Some(100)), Some(108));
        assert_eq!(cal.apply_to(Some(0)), Some(0));
        assert_eq!(cal.apply_to(None), None);
    }

    #[test]
    fn apply_ignores_float_noise() {
        // 50 * 1.1 == 55.00000000000001
        let cal = CalibrationLearner::from_parts(1.1, 1);
        assert_eq!(cal.apply_to(Some(50)), Some(55));
    }

    #[test]
    fn loading_clamps_out_of_range_factor() {
        let cal: CalibrationLearner =
            serde_json::from_str(r#"{"factor":12.0,"session_count":4}"#).unwrap();
        assert_eq!(cal.factor(), MAX_FACTOR);
        assert_eq!(cal.session_count(), 4);

        let cal: CalibrationLearner = serde_json::from_str(r#"{"factor":0.01}"#).unwrap();
        assert_eq!(cal.factor(), MIN_FACTOR);
        assert_eq!(cal.session_count(), 0);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut cal = CalibrationLearner::from_parts(2.5, 7);
        cal.reset();
        assert_eq!(cal.factor(), 1.0);
        assert_eq!(cal.session_count(), 0);
    }

    #[test]
    fn restored_factor_is_clamped() {
        assert_eq!(CalibrationLearner::from_parts(9.0, 1).factor(), MAX_FACTOR);
        assert_eq!(CalibrationLearner::from_parts(f64::NAN, 1).factor(), 1.0);
    }

    #[test]
    fn learning_status_progresses() {
        let mut cal = CalibrationLearner::new();
        assert_eq!(cal.learning_status(), "Learning (no completed sessions yet)");
        cal.record_outcome(100.0, 100.0);
        assert_eq!(cal.learning_status(), "Learning (1 session)");
        cal.record_outcome(100.0, 100.0);
        cal.record_outcome(100.0, 100.0);
        assert_eq!(cal.learning_status(), "Calibrated over 3 sessions (x1.00)");
    }

    proptest! {
        #[test]
        fn factor_stays_in_range(
            outcomes in proptest::collection::vec((0.0f64..1e6, 0.0f64..1e6), 0..40)
        ) {
            let mut cal = CalibrationLearner::new();
            for (predicted, actual) in outcomes {
                let f = cal.record_outcome(predicted, actual);
                prop_assert!((MIN_FACTOR..=MAX_FACTOR).contains(&f));
            }
        }
    }
}
