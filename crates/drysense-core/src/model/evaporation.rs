//! Evaporation power: how favourable conditions are for drying, in [0, 1].

use serde::{Deserialize, Serialize};

use crate::weather::Observation;

/// Where the laundry hangs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationProfile {
    #[default]
    DirectSun,
    PartialShade,
    FullShade,
    Indoor,
}

impl LocationProfile {
    /// Share of available sunlight reaching the line.
    pub fn sun_factor(self) -> f64 {
        match self {
            LocationProfile::DirectSun => 1.0,
            LocationProfile::PartialShade => 0.6,
            LocationProfile::FullShade => 0.2,
            LocationProfile::Indoor => 0.05,
        }
    }

    /// Share of ambient wind reaching the line.
    pub fn wind_factor(self) -> f64 {
        match self {
            LocationProfile::DirectSun => 1.0,
            LocationProfile::PartialShade => 0.85,
            LocationProfile::FullShade => 0.7,
            LocationProfile::Indoor => 0.15,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LocationProfile::DirectSun => "direct-sun",
            LocationProfile::PartialShade => "partial-shade",
            LocationProfile::FullShade => "full-shade",
            LocationProfile::Indoor => "indoor",
        }
    }
}

const WEIGHT_TEMPERATURE: f64 = 0.30;
const WEIGHT_DRYNESS: f64 = 0.40;
const WEIGHT_WIND: f64 = 0.20;
const WEIGHT_SUN: f64 = 0.10;

/// Lux treated as full sun.
pub const FULL_SUN_LUX: f64 = 60_000.0;

/// Score current conditions. Rain stops drying outright.
pub fn evaporation_power(obs: &Observation, profile: LocationProfile) -> f64 {
    if obs.rain_rate() > 0.0 {
        return 0.0;
    }

    let t = obs.temperature.value;
    let rh = obs.humidity.value;
    let depression = obs.dew_point_depression();

    let tn = unit((t - 5.0) / 25.0);
    let dn = match depression {
        Some(d) => unit(d / 20.0),
        None => unit((85.0 - rh) / 55.0),
    };
    let wn = unit(1.0 - (-obs.wind.value / 2.5).exp()) * profile.wind_factor();
    let sn = unit(obs.lux() / FULL_SUN_LUX) * profile.sun_factor();

    let mut e = WEIGHT_TEMPERATURE * tn + WEIGHT_DRYNESS * dn + WEIGHT_WIND * wn + WEIGHT_SUN * sn;

    if rh >= 92.0 {
        e *= 0.25;
    } else if rh >= 85.0 {
        e *= 0.55;
    }
    if t <= 2.0 {
        e *= 0.4;
    }
    // Condensation risk stacks on top of the humidity/cold penalties.
    if depression.is_some_and(|d| d < 2.0) {
        e *= 0.2;
    }

    if e.is_finite() {
        e.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn ideal_conditions_score_high() {
        let obs = Observation::from_device(30.0, 30.0, 10.0)
            .with_dew_point(10.0)
            .with_illuminance(60_000.0)
            .with_rain(0.0);
        let e = evaporation_power(&obs, LocationProfile::DirectSun);
        // Tn=1, Dn=1, Wn=1-e^-4, Sn=1
        let expected = 0.30 + 0.40 + 0.20 * (1.0 - (-4.0f64).exp()) + 0.10;
        assert!(approx(e, expected), "{e}");
    }

    #[test]
    fn humidity_fallback_when_dew_point_unknown() {
        let obs = Observation::from_device(17.5, 57.5, 0.0);
        let e = evaporation_power(&obs, LocationProfile::Indoor);
        // Tn=0.5, Dn=0.5, Wn=0, Sn=0
        assert!(approx(e, 0.30 * 0.5 + 0.40 * 0.5));
    }

    #[test]
    fn humid_and_cold_penalties_stack() {
        let base = Observation::from_device(2.0, 86.0, 0.0);
        let e = evaporation_power(&base, LocationProfile::DirectSun);
        // Tn=0, Dn=0 (RH above 85), so the score is already zero.
        assert_eq!(e, 0.0);

        let obs = Observation::from_device(2.0, 92.0, 5.0).with_dew_point(1.0);
        let raw = 0.40 * (1.0 / 20.0) + 0.20 * (1.0 - (-2.0f64).exp());
        let e = evaporation_power(&obs, LocationProfile::DirectSun);
        assert!(approx(e, raw * 0.25 * 0.4 * 0.2), "{e}");
    }

    #[test]
    fn moderate_humidity_penalty() {
        let obs = Observation::from_device(30.0, 88.0, 0.0).with_dew_point(20.0);
        let raw = 0.30 + 0.40 * 0.5;
        assert!(approx(
            evaporation_power(&obs, LocationProfile::DirectSun),
            raw * 0.55
        ));
    }

    #[test]
    fn shade_reduces_sun_and_wind_contribution() {
        let obs = Observation::from_device(20.0, 50.0, 4.0)
            .with_dew_point(9.0)
            .with_illuminance(40_000.0);
        let sun = evaporation_power(&obs, LocationProfile::DirectSun);
        let partial = evaporation_power(&obs, LocationProfile::PartialShade);
        let shade = evaporation_power(&obs, LocationProfile::FullShade);
        let indoor = evaporation_power(&obs, LocationProfile::Indoor);
        assert!(sun > partial && partial > shade && shade > indoor);
    }

    #[test]
    fn nan_inputs_collapse_to_zero() {
        let obs = Observation::from_device(f64::NAN, f64::NAN, f64::NAN);
        assert_eq!(evaporation_power(&obs, LocationProfile::DirectSun), 0.0);
    }

    fn profiles() -> impl Strategy<Value = LocationProfile> {
        prop_oneof![
            Just(LocationProfile::DirectSun),
            Just(LocationProfile::PartialShade),
            Just(LocationProfile::FullShade),
            Just(LocationProfile::Indoor),
        ]
    }

    proptest! {
        #[test]
        fn rain_always_stops_drying(
            t in -40.0f64..60.0,
            rh in -20.0f64..150.0,
            wind in -5.0f64..80.0,
            lux in -1000.0f64..200_000.0,
            rain in 0.001f64..200.0,
            profile in profiles(),
        ) {
            let obs = Observation::from_device(t, rh, wind)
                .with_illuminance(lux)
                .with_rain(rain);
            prop_assert_eq!(evaporation_power(&obs, profile), 0.0);
        }

        #[test]
        fn power_is_bounded(
            t in -100.0f64..100.0,
            rh in -50.0f64..200.0,
            wind in -50.0f64..200.0,
            lux in -1e6f64..1e6,
            dp in proptest::option::of(-100.0f64..100.0),
            profile in profiles(),
        ) {
            let mut obs = Observation::from_device(t, rh, wind).with_illuminance(lux);
            if let Some(dp) = dp {
                obs = obs.with_dew_point(dp);
            }
            let e = evaporation_power(&obs, profile);
            prop_assert!((0.0..=1.0).contains(&e));
        }
    }
}
