use serde::{Deserialize, Serialize};

/// Which collaborator produced a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Device,
    Remote,
    Derived,
}

/// The weather quantities the aggregator resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    Temperature,
    Humidity,
    DewPoint,
    Wind,
    Rain,
    Illuminance,
}

impl Quantity {
    pub const ALL: [Quantity; 6] = [
        Quantity::Temperature,
        Quantity::Humidity,
        Quantity::DewPoint,
        Quantity::Wind,
        Quantity::Rain,
        Quantity::Illuminance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
            Quantity::DewPoint => "dew point",
            Quantity::Wind => "wind",
            Quantity::Rain => "rain",
            Quantity::Illuminance => "illuminance",
        }
    }

    /// Attribute read from a sensor device when the binding gives no override.
    pub fn default_attribute(&self) -> &'static str {
        match self {
            Quantity::Temperature => "temperature",
            Quantity::Humidity => "humidity",
            Quantity::DewPoint => "dewPoint",
            Quantity::Wind => "windSpeed",
            Quantity::Rain => "rainRate",
            Quantity::Illuminance => "illuminance",
        }
    }
}

/// A value tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measured {
    pub value: f64,
    pub source: Source,
}

impl Measured {
    pub fn new(value: f64, source: Source) -> Self {
        Self { value, source }
    }

    pub fn device(value: f64) -> Self {
        Self::new(value, Source::Device)
    }

    pub fn remote(value: f64) -> Self {
        Self::new(value, Source::Remote)
    }
}

/// One normalized weather observation. Temperature, humidity and wind are
/// mandatory; an observation without them is never constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Air temperature, °C.
    pub temperature: Measured,
    /// Relative humidity, %.
    pub humidity: Measured,
    /// Wind speed, m/s.
    pub wind: Measured,
    /// Illuminance, lux.
    pub illuminance: Option<Measured>,
    /// Rain rate, mm/hr.
    pub rain: Option<Measured>,
    /// Dew point, °C.
    pub dew_point: Option<Measured>,
}

impl Observation {
    /// Build an observation from plain device readings. Convenient for tests
    /// and for hosts that already hold normalized values.
    pub fn from_device(temperature: f64, humidity: f64, wind: f64) -> Self {
        Self {
            temperature: Measured::device(temperature),
            humidity: Measured::device(humidity),
            wind: Measured::device(wind),
            illuminance: None,
            rain: None,
            dew_point: None,
        }
    }

    pub fn with_illuminance(mut self, lux: f64) -> Self {
        self.illuminance = Some(Measured::device(lux));
        self
    }

    pub fn with_rain(mut self, mm_per_hour: f64) -> Self {
        self.rain = Some(Measured::device(mm_per_hour));
        self
    }

    pub fn with_dew_point(mut self, dew_point: f64) -> Self {
        self.dew_point = Some(Measured::device(dew_point));
        self
    }

    pub fn rain_rate(&self) -> f64 {
        self.rain.map(|r| r.value).unwrap_or(0.0)
    }

    pub fn lux(&self) -> f64 {
        self.illuminance.map(|l| l.value).unwrap_or(0.0)
    }

    /// Temperature minus dew point, when the dew point is known.
    pub fn dew_point_depression(&self) -> Option<f64> {
        self.dew_point
            .map(|dp| self.temperature.value - dp.value)
    }

    /// One-line human readable summary for the conditions attribute.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{:.1}°C", self.temperature.value),
            format!("{:.0}% RH", self.humidity.value),
        ];
        if let Some(dp) = self.dew_point {
            parts.push(format!("dew point {:.1}°C", dp.value));
        }
        parts.push(format!("wind {:.1} m/s", self.wind.value));
        if let Some(lux) = self.illuminance {
            parts.push(format!("{:.0} lux", lux.value));
        }
        if self.rain_rate() > 0.0 {
            parts.push(format!("rain {:.1} mm/h", self.rain_rate()));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depression_requires_dew_point() {
        let obs = Observation::from_device(20.0, 60.0, 1.0);
        assert!(obs.dew_point_depression().is_none());
        let obs = obs.with_dew_point(12.5);
        assert_eq!(obs.dew_point_depression(), Some(7.5));
    }

    #[test]
    fn summary_skips_dry_rain() {
        let obs = Observation::from_device(18.04, 62.0, 2.1)
            .with_dew_point(10.6)
            .with_illuminance(35000.0)
            .with_rain(0.0);
        assert_eq!(
            obs.summary(),
            "18.0°C, 62% RH, dew point 10.6°C, wind 2.1 m/s, 35000 lux"
        );
    }
}
