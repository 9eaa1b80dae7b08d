//! Magnus-Tetens dew point approximation.

const MAGNUS_A: f64 = 17.27;
const MAGNUS_B: f64 = 237.7;

/// Humidity floor keeping `ln(RH/100)` finite.
const MIN_HUMIDITY: f64 = 0.1;

/// Dew point in °C from temperature (°C) and relative humidity (%),
/// rounded half-up to one decimal place.
pub fn dew_point(temperature: f64, humidity: f64) -> f64 {
    let rh = humidity.clamp(MIN_HUMIDITY, 100.0);
    let alpha = MAGNUS_A * temperature / (MAGNUS_B + temperature) + (rh / 100.0).ln();
    let dp = MAGNUS_B * alpha / (MAGNUS_A - alpha);
    round_one_decimal(dp)
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_moderate_humidity() {
        assert_eq!(dew_point(25.0, 52.0), 14.4);
    }

    #[test]
    fn saturated_air_dew_point_equals_temperature() {
        assert_eq!(dew_point(20.0, 100.0), 20.0);
        assert_eq!(dew_point(20.0, 140.0), 20.0);
    }

    #[test]
    fn zero_humidity_stays_finite() {
        let dp = dew_point(10.0, 0.0);
        assert!(dp.is_finite());
        assert!(dp < -40.0);
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(round_one_decimal(1.25), 1.3);
        assert_eq!(round_one_decimal(-1.25), -1.2);
    }
}
