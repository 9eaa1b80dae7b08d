//! Weather acquisition: sensors, the remote fallback and their merge.

mod aggregator;
mod dew_point;
mod observation;
pub mod remote;
pub mod sensors;

pub use aggregator::{WeatherAggregator, WeatherSettings, DEFAULT_NOMINAL_RAIN_MM_HR};
pub use dew_point::dew_point;
pub use observation::{Measured, Observation, Quantity, Source};
pub use remote::{Coordinate, NoRemote, OpenMeteoClient, RemoteSnapshot, RemoteWeather};
pub use sensors::{
    FileSensors, RainUnit, Reading, SensorBinding, SensorDocument, SensorMap, SensorReader,
    StaticSensors, WindUnit,
};
