//! Sensor read interface and the resolved sensor map.
//!
//! The host platform owns the actual devices. drysense only needs the latest
//! numeric value of an attribute and how old it is, so the seam is the small
//! [`SensorReader`] trait. Attribute names are validated once, when the
//! [`SensorMap`] is resolved from configuration.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::observation::Quantity;
use crate::error::{ConfigError, CoreError};

/// A fresh numeric reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub age: Duration,
}

/// Reads the latest value of a device attribute.
///
/// Implementations return `None` for missing, non-numeric or stale values.
pub trait SensorReader {
    fn read_fresh(
        &self,
        device: &str,
        attribute: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<Reading>;
}

/// Unit reported by the wind sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindUnit {
    #[default]
    #[serde(rename = "m/s")]
    MetersPerSecond,
    #[serde(rename = "km/h")]
    KilometersPerHour,
}

impl WindUnit {
    pub fn to_meters_per_second(self, value: f64) -> f64 {
        match self {
            WindUnit::MetersPerSecond => value,
            WindUnit::KilometersPerHour => value / 3.6,
        }
    }
}

/// Unit reported by the rain sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RainUnit {
    #[default]
    #[serde(rename = "mm/h")]
    MillimetersPerHour,
    /// Binary wet/dry sensor with no rate.
    #[serde(rename = "detected")]
    Detected,
}

impl RainUnit {
    pub fn to_mm_per_hour(self, value: f64, nominal_rate: f64) -> f64 {
        match self {
            RainUnit::MillimetersPerHour => value.max(0.0),
            RainUnit::Detected if value > 0.0 => nominal_rate,
            RainUnit::Detected => 0.0,
        }
    }
}

/// Configured device binding for one quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorBinding {
    pub device: String,
    /// Overrides [`Quantity::default_attribute`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

/// A validated binding: which device and attribute hold a quantity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub device: String,
    pub attribute: String,
}

/// Quantity -> device attribute, with unit conversion settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SensorMap {
    sources: HashMap<Quantity, ResolvedSource>,
    pub wind_unit: WindUnit,
    pub rain_unit: RainUnit,
}

impl SensorMap {
    /// Validate bindings and resolve default attribute names.
    pub fn resolve<'a, I>(
        bindings: I,
        wind_unit: WindUnit,
        rain_unit: RainUnit,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (Quantity, &'a SensorBinding)>,
    {
        let mut sources = HashMap::new();
        for (quantity, binding) in bindings {
            let key = format!("sensors.{}", quantity_key(quantity));
            let device = binding.device.trim();
            if device.is_empty() {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "device id is empty".into(),
                });
            }
            let attribute = match binding.attribute.as_deref().map(str::trim) {
                None => quantity.default_attribute().to_string(),
                Some(attr) if is_attribute_name(attr) => attr.to_string(),
                Some(attr) => {
                    return Err(ConfigError::InvalidValue {
                        key,
                        message: format!("'{attr}' is not a valid attribute name"),
                    })
                }
            };
            sources.insert(
                quantity,
                ResolvedSource {
                    device: device.to_string(),
                    attribute,
                },
            );
        }
        Ok(Self {
            sources,
            wind_unit,
            rain_unit,
        })
    }

    pub fn source(&self, quantity: Quantity) -> Option<&ResolvedSource> {
        self.sources.get(&quantity)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Config-file key for a quantity.
pub fn quantity_key(quantity: Quantity) -> &'static str {
    match quantity {
        Quantity::Temperature => "temperature",
        Quantity::Humidity => "humidity",
        Quantity::DewPoint => "dew_point",
        Quantity::Wind => "wind",
        Quantity::Rain => "rain",
        Quantity::Illuminance => "illuminance",
    }
}

fn is_attribute_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ── Reading documents ───────────────────────────────────────────────

/// Last reported value of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub value: serde_json::Value,
    pub at: DateTime<Utc>,
}

impl StoredReading {
    /// Numeric interpretation; `None` for anything that is not a finite number.
    pub fn numeric(&self) -> Option<f64> {
        let value = match &self.value {
            serde_json::Value::Number(n) => n.as_f64()?,
            serde_json::Value::Bool(b) => f64::from(u8::from(*b)),
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "wet" | "detected" | "on" => 1.0,
                "dry" | "clear" | "off" => 0.0,
                other => other.parse::<f64>().ok()?,
            },
            _ => return None,
        };
        value.is_finite().then_some(value)
    }
}

/// Device id -> attribute -> reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorDocument {
    #[serde(default)]
    pub devices: BTreeMap<String, BTreeMap<String, StoredReading>>,
}

impl SensorDocument {
    pub fn set(
        &mut self,
        device: &str,
        attribute: &str,
        value: serde_json::Value,
        at: DateTime<Utc>,
    ) {
        self.devices
            .entry(device.to_string())
            .or_default()
            .insert(attribute.to_string(), StoredReading { value, at });
    }

    fn lookup(
        &self,
        device: &str,
        attribute: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<Reading> {
        let stored = self.devices.get(device)?.get(attribute)?;
        let Some(value) = stored.numeric() else {
            tracing::debug!(device, attribute, "ignoring non-numeric reading");
            return None;
        };
        let age = now.signed_duration_since(stored.at).max(Duration::zero());
        if age > max_age {
            tracing::debug!(
                device,
                attribute,
                age_min = age.num_minutes(),
                "ignoring stale reading"
            );
            return None;
        }
        Some(Reading { value, age })
    }
}

/// In-memory readings, for embedding hosts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSensors {
    document: SensorDocument,
}

impl StaticSensors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, device: &str, attribute: &str, value: f64, at: DateTime<Utc>) {
        self.document.set(device, attribute, value.into(), at);
    }

    pub fn set_raw(
        &mut self,
        device: &str,
        attribute: &str,
        value: serde_json::Value,
        at: DateTime<Utc>,
    ) {
        self.document.set(device, attribute, value, at);
    }
}

impl SensorReader for StaticSensors {
    fn read_fresh(
        &self,
        device: &str,
        attribute: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<Reading> {
        self.document.lookup(device, attribute, max_age, now)
    }
}

/// Readings kept in a JSON document that a host bridge rewrites.
///
/// The file is re-read on every lookup so external updates are picked up
/// between ticks. A missing or unreadable file means no readings.
#[derive(Debug, Clone)]
pub struct FileSensors {
    path: PathBuf,
}

impl FileSensors {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, empty if the file does not exist yet.
    pub fn load(&self) -> Result<SensorDocument, CoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SensorDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Record one reading and persist the document.
    pub fn record(
        &self,
        device: &str,
        attribute: &str,
        value: serde_json::Value,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let mut doc = self.load()?;
        doc.set(device, attribute, value, at);
        std::fs::write(&self.path, serde_json::to_string_pretty(&doc)?)?;
        Ok(())
    }
}

impl SensorReader for FileSensors {
    fn read_fresh(
        &self,
        device: &str,
        attribute: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Option<Reading> {
        match self.load() {
            Ok(doc) => doc.lookup(device, attribute, max_age, now),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "cannot read sensor file: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn binding(device: &str, attribute: Option<&str>) -> SensorBinding {
        SensorBinding {
            device: device.into(),
            attribute: attribute.map(Into::into),
        }
    }

    #[test]
    fn resolve_applies_default_attribute_names() {
        let wind = binding("station", None);
        let rain = binding("gauge", Some("precipRate"));
        let map = SensorMap::resolve(
            [(Quantity::Wind, &wind), (Quantity::Rain, &rain)],
            WindUnit::KilometersPerHour,
            RainUnit::MillimetersPerHour,
        )
        .unwrap();
        assert_eq!(map.source(Quantity::Wind).unwrap().attribute, "windSpeed");
        assert_eq!(map.source(Quantity::Rain).unwrap().attribute, "precipRate");
        assert!(map.source(Quantity::Temperature).is_none());
    }

    #[test]
    fn resolve_rejects_bad_bindings() {
        let empty = binding("  ", None);
        let err = SensorMap::resolve(
            [(Quantity::Temperature, &empty)],
            WindUnit::default(),
            RainUnit::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("sensors.temperature"));

        let spaced = binding("station", Some("wind speed"));
        assert!(SensorMap::resolve(
            [(Quantity::Wind, &spaced)],
            WindUnit::default(),
            RainUnit::default(),
        )
        .is_err());
    }

    #[test]
    fn unit_conversions() {
        assert!((WindUnit::KilometersPerHour.to_meters_per_second(18.0) - 5.0).abs() < 1e-9);
        assert_eq!(RainUnit::Detected.to_mm_per_hour(1.0, 0.2), 0.2);
        assert_eq!(RainUnit::Detected.to_mm_per_hour(0.0, 0.2), 0.0);
        assert_eq!(RainUnit::MillimetersPerHour.to_mm_per_hour(1.4, 0.2), 1.4);
    }

    #[test]
    fn stale_and_non_numeric_readings_are_absent() {
        let now = Utc::now();
        let mut sensors = StaticSensors::new();
        sensors.set("t", "temperature", 21.0, now - Duration::minutes(30));
        sensors.set_raw("h", "humidity", json!("n/a"), now);
        sensors.set("w", "windSpeed", 3.0, now - Duration::minutes(5));

        let max_age = Duration::minutes(20);
        assert!(sensors.read_fresh("t", "temperature", max_age, now).is_none());
        assert!(sensors.read_fresh("h", "humidity", max_age, now).is_none());
        assert!(sensors.read_fresh("x", "anything", max_age, now).is_none());

        let wind = sensors.read_fresh("w", "windSpeed", max_age, now).unwrap();
        assert_eq!(wind.value, 3.0);
        assert_eq!(wind.age, Duration::minutes(5));
    }

    #[test]
    fn qualitative_values_map_to_numbers() {
        let at = Utc::now();
        let reading = |v: serde_json::Value| StoredReading { value: v, at }.numeric();
        assert_eq!(reading(json!("wet")), Some(1.0));
        assert_eq!(reading(json!("dry")), Some(0.0));
        assert_eq!(reading(json!(true)), Some(1.0));
        assert_eq!(reading(json!("12.5")), Some(12.5));
        assert_eq!(reading(json!(null)), None);
    }

    #[test]
    fn file_sensors_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let sensors = FileSensors::new(dir.path().join("sensors.json"));
        let now = Utc::now();

        assert!(sensors
            .read_fresh("porch", "temperature", Duration::minutes(20), now)
            .is_none());

        sensors
            .record("porch", "temperature", json!(19.5), now)
            .unwrap();
        let reading = sensors
            .read_fresh("porch", "temperature", Duration::minutes(20), now)
            .unwrap();
        assert_eq!(reading.value, 19.5);
    }
}
