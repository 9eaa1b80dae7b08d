use serde::{Deserialize, Serialize};

/// Evaporation power that dries a normal load in exactly the preset time.
pub const REFERENCE_POWER: f64 = 0.70;

const EMA_KEEP: f64 = 0.75;
const EMA_TAKE: f64 = 0.25;

/// Drying speed preset: hours a load needs at reference power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DryingSpeed {
    Fast,
    #[default]
    Normal,
    Slow,
}

impl DryingSpeed {
    pub fn preset_hours(self) -> f64 {
        match self {
            DryingSpeed::Fast => 3.0,
            DryingSpeed::Normal => 4.5,
            DryingSpeed::Slow => 6.5,
        }
    }
}

/// Instantaneous drying rate, fraction of a load per hour.
pub fn instantaneous_rate(power: f64, speed: DryingSpeed) -> f64 {
    (power / REFERENCE_POWER) * (1.0 / speed.preset_hours())
}

/// Asymmetric EMA step.
///
/// A sharp rise (previous below half the new rate, e.g. the sun came out)
/// snaps straight to the new rate; anything else is blended 75/25.
pub fn smooth_rate(previous_ema: f64, power: f64, speed: DryingSpeed) -> f64 {
    let rate = instantaneous_rate(power, speed);
    if previous_ema < rate * 0.5 {
        rate
    } else {
        previous_ema * EMA_KEEP + rate * EMA_TAKE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Power that produces `rate` at the given speed.
    fn power_for(rate: f64, speed: DryingSpeed) -> f64 {
        rate * REFERENCE_POWER * speed.preset_hours()
    }

    #[test]
    fn reference_power_dries_load_in_preset_time() {
        for speed in [DryingSpeed::Fast, DryingSpeed::Normal, DryingSpeed::Slow] {
            let rate = instantaneous_rate(REFERENCE_POWER, speed);
            assert!((rate * speed.preset_hours() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn sharp_rise_snaps() {
        let power = power_for(0.1, DryingSpeed::Normal);
        let ema = smooth_rate(0.01, power, DryingSpeed::Normal);
        assert!((ema - 0.1).abs() < 1e-12);
    }

    #[test]
    fn gradual_change_blends() {
        let power = power_for(0.09, DryingSpeed::Normal);
        let ema = smooth_rate(0.1, power, DryingSpeed::Normal);
        assert!((ema - 0.0975).abs() < 1e-12);
    }

    #[test]
    fn falling_rate_decays_instead_of_dropping() {
        let ema = smooth_rate(0.2, 0.0, DryingSpeed::Fast);
        assert!((ema - 0.15).abs() < 1e-12);
    }

    #[test]
    fn zero_stays_zero() {
        assert_eq!(smooth_rate(0.0, 0.0, DryingSpeed::Slow), 0.0);
    }
}
