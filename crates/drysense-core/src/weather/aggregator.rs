//! Merges sensor readings and the remote fallback into one observation.

use chrono::{DateTime, Duration, Utc};

use super::dew_point::dew_point;
use super::observation::{Measured, Observation, Quantity, Source};
use super::remote::{Coordinate, RemoteSnapshot, RemoteWeather};
use super::sensors::{SensorMap, SensorReader};
use crate::error::{ConfigError, FetchError, WeatherError};

pub const DEFAULT_NOMINAL_RAIN_MM_HR: f64 = 0.2;

/// How the aggregator fills gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSettings {
    pub fallback_enabled: bool,
    /// Device override if set, otherwise the hub location.
    pub location: Option<Coordinate>,
    /// Rate substituted when a binary rain sensor reports rain.
    pub nominal_rain_mm_hr: f64,
}

impl Default for WeatherSettings {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            location: None,
            nominal_rain_mm_hr: DEFAULT_NOMINAL_RAIN_MM_HR,
        }
    }
}

/// Values gathered so far, one slot per quantity.
#[derive(Debug, Default)]
struct Partial {
    temperature: Option<Measured>,
    humidity: Option<Measured>,
    dew_point: Option<Measured>,
    wind: Option<Measured>,
    rain: Option<Measured>,
    illuminance: Option<Measured>,
}

impl Partial {
    fn slot(&mut self, quantity: Quantity) -> &mut Option<Measured> {
        match quantity {
            Quantity::Temperature => &mut self.temperature,
            Quantity::Humidity => &mut self.humidity,
            Quantity::DewPoint => &mut self.dew_point,
            Quantity::Wind => &mut self.wind,
            Quantity::Rain => &mut self.rain,
            Quantity::Illuminance => &mut self.illuminance,
        }
    }

    fn missing_required(&self) -> Vec<Quantity> {
        [
            (Quantity::Temperature, self.temperature),
            (Quantity::Humidity, self.humidity),
            (Quantity::Wind, self.wind),
        ]
        .into_iter()
        .filter_map(|(q, v)| v.is_none().then_some(q))
        .collect()
    }

    fn wants_fallback(&self) -> bool {
        !self.missing_required().is_empty() || self.rain.is_none() || self.illuminance.is_none()
    }

    fn fill_from(&mut self, snapshot: &RemoteSnapshot) {
        let remote = [
            (Quantity::Temperature, snapshot.temperature),
            (Quantity::Humidity, snapshot.humidity),
            (Quantity::DewPoint, snapshot.dew_point),
            (Quantity::Wind, snapshot.wind_kmh.map(|kmh| kmh / 3.6)),
            (Quantity::Rain, snapshot.precipitation.map(|p| p.max(0.0))),
            (Quantity::Illuminance, snapshot.illuminance()),
        ];
        for (quantity, value) in remote {
            let slot = self.slot(quantity);
            if slot.is_none() {
                *slot = value.filter(|v| v.is_finite()).map(Measured::remote);
            }
        }
    }
}

/// Produces one [`Observation`] per tick.
pub struct WeatherAggregator<S, R> {
    sensors: S,
    remote: R,
    map: SensorMap,
    settings: WeatherSettings,
}

impl<S: SensorReader, R: RemoteWeather> WeatherAggregator<S, R> {
    pub fn new(sensors: S, remote: R, map: SensorMap, settings: WeatherSettings) -> Self {
        Self {
            sensors,
            remote,
            map,
            settings,
        }
    }

    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn settings(&self) -> &WeatherSettings {
        &self.settings
    }

    /// Resolve a usable observation, reading sensors first and the remote
    /// service for whatever is still missing.
    pub fn observe(
        &self,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<Observation, WeatherError> {
        let mut partial = self.read_sensors(max_age, now);

        let mut fallback_attempted = false;
        if partial.wants_fallback() && self.settings.fallback_enabled {
            // Any gap left for the remote fails the tick if the remote can't fill it.
            let at = self.settings.location.ok_or(ConfigError::NoLocation)?;
            fallback_attempted = true;
            let snapshot = self.remote.current(at).inspect_err(|e| {
                tracing::warn!("weather fallback failed: {e}");
            })?;
            partial.fill_from(&snapshot);
        }

        let missing = partial.missing_required();
        let (Some(temperature), Some(humidity), Some(wind)) =
            (partial.temperature, partial.humidity, partial.wind)
        else {
            return Err(if self.settings.fallback_enabled {
                FetchError::MissingFields {
                    missing,
                    fallback_attempted,
                }
                .into()
            } else {
                ConfigError::NoUsableSource { missing }.into()
            });
        };

        let dew_point = Some(partial.dew_point.unwrap_or_else(|| {
            Measured::new(dew_point(temperature.value, humidity.value), Source::Derived)
        }));

        Ok(Observation {
            temperature,
            humidity,
            wind,
            illuminance: partial.illuminance,
            rain: partial.rain,
            dew_point,
        })
    }

    fn read_sensors(&self, max_age: Duration, now: DateTime<Utc>) -> Partial {
        let mut partial = Partial::default();
        for quantity in Quantity::ALL {
            let Some(source) = self.map.source(quantity) else {
                continue;
            };
            match self
                .sensors
                .read_fresh(&source.device, &source.attribute, max_age, now)
            {
                Some(reading) => {
                    let value = self.normalize(quantity, reading.value);
                    tracing::debug!(
                        quantity = quantity.as_str(),
                        value,
                        age_s = reading.age.num_seconds(),
                        "sensor reading"
                    );
                    *partial.slot(quantity) = Some(Measured::device(value));
                }
                None => {
                    tracing::debug!(
                        quantity = quantity.as_str(),
                        device = %source.device,
                        "no fresh reading"
                    );
                }
            }
        }
        partial
    }

    fn normalize(&self, quantity: Quantity, value: f64) -> f64 {
        match quantity {
            Quantity::Wind => self.map.wind_unit.to_meters_per_second(value),
            Quantity::Rain => self
                .map
                .rain_unit
                .to_mm_per_hour(value, self.settings.nominal_rain_mm_hr),
            _ => value,
        }
    }
}
