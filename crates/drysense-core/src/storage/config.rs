//! TOML-based configuration.
//!
//! Stores one installation's settings:
//! - Update interval and sensor staleness threshold
//! - Drying location profile and speed preset
//! - Device/hub coordinates for the weather fallback
//! - Sensor bindings and their units
//!
//! Configuration is stored at `~/.config/drysense/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::device::DeviceSettings;
use crate::error::ConfigError;
use crate::model::{DryingSpeed, LocationProfile};
use crate::session::SessionSettings;
use crate::weather::remote::DEFAULT_ENDPOINT;
use crate::weather::sensors::quantity_key;
use crate::weather::{
    Coordinate, Quantity, RainUnit, SensorBinding, SensorMap, WeatherSettings, WindUnit,
    DEFAULT_NOMINAL_RAIN_MM_HR,
};

pub const UPDATE_INTERVAL_RANGE: std::ops::RangeInclusive<u32> = 1..=60;
pub const STALE_AFTER_RANGE: std::ops::RangeInclusive<u32> = 2..=240;

/// Settings of the tracked drying spot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_update_interval")]
    pub update_interval_min: u32,
    /// Sensor readings older than this are ignored.
    #[serde(default = "default_stale_after")]
    pub stale_after_min: u32,
    #[serde(default)]
    pub location: LocationProfile,
    #[serde(default)]
    pub speed: DryingSpeed,
    /// Overrides the hub location when both are set.
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Process-wide default location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Remote weather fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Rate assumed while a binary rain sensor reports rain.
    #[serde(default = "default_nominal_rain")]
    pub nominal_rain_mm_hr: f64,
}

/// Sensor bindings, one optional device per quantity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorsConfig {
    #[serde(default)]
    pub temperature: Option<SensorBinding>,
    #[serde(default)]
    pub humidity: Option<SensorBinding>,
    #[serde(default)]
    pub dew_point: Option<SensorBinding>,
    #[serde(default)]
    pub wind: Option<SensorBinding>,
    #[serde(default)]
    pub rain: Option<SensorBinding>,
    #[serde(default)]
    pub illuminance: Option<SensorBinding>,
    #[serde(default)]
    pub wind_unit: WindUnit,
    #[serde(default)]
    pub rain_unit: RainUnit,
}

impl SensorsConfig {
    pub fn binding(&self, quantity: Quantity) -> Option<&SensorBinding> {
        match quantity {
            Quantity::Temperature => self.temperature.as_ref(),
            Quantity::Humidity => self.humidity.as_ref(),
            Quantity::DewPoint => self.dew_point.as_ref(),
            Quantity::Wind => self.wind.as_ref(),
            Quantity::Rain => self.rain.as_ref(),
            Quantity::Illuminance => self.illuminance.as_ref(),
        }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/drysense/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Raise default log verbosity to debug.
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
}

fn default_update_interval() -> u32 {
    5
}
fn default_stale_after() -> u32 {
    20
}
fn default_true() -> bool {
    true
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_nominal_rain() -> f64 {
    DEFAULT_NOMINAL_RAIN_MM_HR
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            update_interval_min: default_update_interval(),
            stale_after_min: default_stale_after(),
            location: LocationProfile::default(),
            speed: DryingSpeed::default(),
            latitude: None,
            longitude: None,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            nominal_rain_mm_hr: default_nominal_rain(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            device: DeviceConfig::default(),
            hub: HubConfig::default(),
            weather: WeatherConfig::default(),
            sensors: SensorsConfig::default(),
        }
    }
}

impl Config {
    fn lookup<'a>(root: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |node, part| node.get(part))
    }

    fn assign(root: &mut serde_json::Value, key: &str, value: &str) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_key, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }
        let parent = match parent_key {
            Some(path) => path
                .split('.')
                .try_fold(&mut *root, |node, part| node.get_mut(part))
                .ok_or_else(unknown)?,
            None => root,
        };
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|_| invalid(format!("'{value}' is not true/false")))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::Number(n.into())
                } else {
                    value
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(serde_json::Value::Number)
                        .ok_or_else(|| invalid(format!("cannot parse '{value}' as number")))?
                }
            }
            serde_json::Value::String(_) => serde_json::Value::String(value.into()),
            // Unset optionals and tables take JSON, falling back to a bare string.
            _ => serde_json::from_str(value)
                .unwrap_or_else(|_| serde_json::Value::String(value.into())),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from the data directory, writing defaults on first run.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path` or return (and persist) defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::lookup(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key. The result must validate;
    /// nothing is persisted here.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::assign(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Check ranges and resolve sensor bindings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if !UPDATE_INTERVAL_RANGE.contains(&self.device.update_interval_min) {
            return Err(invalid(
                "device.update_interval_min",
                format!("{} is outside 1..=60 minutes", self.device.update_interval_min),
            ));
        }
        if !STALE_AFTER_RANGE.contains(&self.device.stale_after_min) {
            return Err(invalid(
                "device.stale_after_min",
                format!("{} is outside 2..=240 minutes", self.device.stale_after_min),
            ));
        }
        coordinate("device", self.device.latitude, self.device.longitude)?;
        coordinate("hub", self.hub.latitude, self.hub.longitude)?;
        if self.weather.timeout_secs == 0 {
            return Err(invalid("weather.timeout_secs", "must be at least 1".into()));
        }
        if self.weather.nominal_rain_mm_hr.is_nan() || self.weather.nominal_rain_mm_hr <= 0.0 {
            return Err(invalid(
                "weather.nominal_rain_mm_hr",
                "must be greater than zero".into(),
            ));
        }
        url::Url::parse(&self.weather.endpoint)
            .map_err(|e| invalid("weather.endpoint", e.to_string()))?;
        self.sensor_map()?;
        Ok(())
    }

    pub fn sensor_map(&self) -> Result<SensorMap, ConfigError> {
        SensorMap::resolve(
            Quantity::ALL
                .into_iter()
                .filter_map(|q| self.sensors.binding(q).map(|b| (q, b))),
            self.sensors.wind_unit,
            self.sensors.rain_unit,
        )
    }

    /// Device coordinates if set, otherwise the hub's.
    pub fn location(&self) -> Option<Coordinate> {
        let device = coordinate("device", self.device.latitude, self.device.longitude).ok()?;
        let hub = coordinate("hub", self.hub.latitude, self.hub.longitude).ok()?;
        device.or(hub)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            update_interval_min: self.device.update_interval_min,
            profile: self.device.location,
            speed: self.device.speed,
        }
    }

    pub fn weather_settings(&self) -> WeatherSettings {
        WeatherSettings {
            fallback_enabled: self.weather.fallback_enabled,
            location: self.location(),
            nominal_rain_mm_hr: self.weather.nominal_rain_mm_hr,
        }
    }

    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            session: self.session_settings(),
            stale_after_min: self.device.stale_after_min,
        }
    }

    /// Config keys of the sensor bindings, for help output.
    pub fn sensor_keys() -> impl Iterator<Item = String> {
        Quantity::ALL
            .into_iter()
            .map(|q| format!("sensors.{}", quantity_key(q)))
    }
}

fn coordinate(
    section: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Option<Coordinate>, ConfigError> {
    if let Some(lat) = latitude.filter(|lat| !(-90.0..=90.0).contains(lat)) {
        return Err(ConfigError::InvalidValue {
            key: format!("{section}.latitude"),
            message: format!("{lat} is outside -90..=90"),
        });
    }
    if let Some(lon) = longitude.filter(|lon| !(-180.0..=180.0).contains(lon)) {
        return Err(ConfigError::InvalidValue {
            key: format!("{section}.longitude"),
            message: format!("{lon} is outside -180..=180"),
        });
    }
    // A half-set pair is not a location.
    Ok(latitude
        .zip(longitude)
        .map(|(lat, lon)| Coordinate::new(lat, lon)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.device.update_interval_min, 5);
        assert_eq!(parsed.device.stale_after_min, 20);
        assert!(parsed.weather.fallback_enabled);
        assert_eq!(parsed.weather.nominal_rain_mm_hr, 0.2);
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn partial_file_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [device]
            location = "full-shade"
            speed = "slow"

            [sensors]
            wind_unit = "km/h"
            rain_unit = "detected"

            [sensors.wind]
            device = "station"
            attribute = "wind"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.device.location, LocationProfile::FullShade);
        assert_eq!(parsed.device.speed, DryingSpeed::Slow);
        assert_eq!(parsed.device.update_interval_min, 5);
        let map = parsed.sensor_map().unwrap();
        assert_eq!(map.wind_unit, WindUnit::KilometersPerHour);
        assert_eq!(map.source(Quantity::Wind).unwrap().attribute, "wind");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("device.update_interval_min").as_deref(), Some("5"));
        assert_eq!(cfg.get("device.location").as_deref(), Some("direct-sun"));
        assert_eq!(cfg.get("weather.fallback_enabled").as_deref(), Some("true"));
        assert!(cfg.get("device.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("device.update_interval_min", "10").unwrap();
        cfg.set("weather.fallback_enabled", "false").unwrap();
        cfg.set("device.speed", "fast").unwrap();
        cfg.set("weather.nominal_rain_mm_hr", "0.5").unwrap();
        assert_eq!(cfg.device.update_interval_min, 10);
        assert!(!cfg.weather.fallback_enabled);
        assert_eq!(cfg.device.speed, DryingSpeed::Fast);
        assert_eq!(cfg.weather.nominal_rain_mm_hr, 0.5);
    }

    #[test]
    fn set_fills_unset_optionals() {
        let mut cfg = Config::default();
        cfg.set("hub.latitude", "51.5").unwrap();
        assert_eq!(cfg.hub.latitude, Some(51.5));
        assert!(cfg.location().is_none());
        cfg.set("hub.longitude", "-0.12").unwrap();
        assert_eq!(cfg.location(), Some(Coordinate::new(51.5, -0.12)));
        assert!(cfg.set("hub.latitude", "91").is_err());

        cfg.set("sensors.temperature", r#"{"device":"porch"}"#).unwrap();
        assert_eq!(cfg.sensors.temperature.as_ref().unwrap().device, "porch");
        cfg.set("sensors.temperature", "null").unwrap();
        assert!(cfg.sensors.temperature.is_none());
    }

    #[test]
    fn set_rejects_unknown_keys_and_bad_values() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("device.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("weather.fallback_enabled", "maybe").is_err());
        assert!(cfg.set("device.location", "garage").is_err());
        assert!(cfg.set("device.update_interval_min", "0").is_err());
        assert!(cfg.set("device.update_interval_min", "61").is_err());
        assert!(cfg.set("device.stale_after_min", "1").is_err());
        assert_eq!(cfg.device.update_interval_min, 5);
    }

    #[test]
    fn rain_rate_must_be_positive() {
        let mut cfg = Config::default();
        assert!(cfg.set("weather.nominal_rain_mm_hr", "0").is_err());
        assert!(cfg.set("weather.nominal_rain_mm_hr", "-0.5").is_err());
        assert_eq!(cfg.weather.nominal_rain_mm_hr, 0.2);

        cfg.weather.nominal_rain_mm_hr = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn device_location_overrides_hub() {
        let mut cfg = Config::default();
        assert!(cfg.location().is_none());
        cfg.hub.latitude = Some(48.1);
        cfg.hub.longitude = Some(11.6);
        assert_eq!(cfg.location(), Some(Coordinate::new(48.1, 11.6)));
        cfg.device.latitude = Some(52.5);
        cfg.device.longitude = Some(13.4);
        assert_eq!(cfg.location(), Some(Coordinate::new(52.5, 13.4)));
    }

    #[test]
    fn validate_checks_coordinates_and_bindings() {
        let mut cfg = Config::default();
        cfg.device.latitude = Some(120.0);
        cfg.device.longitude = Some(0.0);
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.sensors.rain = Some(SensorBinding {
            device: String::new(),
            attribute: None,
        });
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_from_writes_defaults_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.device.update_interval_min, 5);

        let mut cfg = cfg;
        cfg.set("device.location", "indoor").unwrap();
        cfg.save_to(&path).unwrap();
        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.device.location, LocationProfile::Indoor);
    }
}
