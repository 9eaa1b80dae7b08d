use chrono::{DateTime, Utc};
use clap::Subcommand;

use super::session::sensor_file;

#[derive(Subcommand)]
pub enum SensorAction {
    /// Record a reading
    Set {
        /// Device name as bound in `[sensors]`
        device: String,
        /// Attribute, e.g. "temperature" or "windSpeed"
        attribute: String,
        /// Numeric value, true/false, or a state such as "wet"
        value: String,
        /// Reading time (RFC 3339), defaults to now
        #[arg(long)]
        at: Option<String>,
    },
    /// Print all recorded readings as JSON
    List,
}

fn parse_value(value: &str) -> serde_json::Value {
    if let Ok(n) = value.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return serde_json::Value::Number(n);
        }
    }
    match value {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        other => serde_json::Value::String(other.to_string()),
    }
}

pub fn run(action: SensorAction) -> Result<(), Box<dyn std::error::Error>> {
    let sensors = sensor_file()?;
    match action {
        SensorAction::Set {
            device,
            attribute,
            value,
            at,
        } => {
            let at = match at {
                Some(s) => DateTime::parse_from_rfc3339(&s)
                    .map_err(|e| format!("invalid time '{s}': {e}"))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            sensors.record(&device, &attribute, parse_value(&value), at)?;
            println!("ok");
        }
        SensorAction::List => {
            let doc = sensors.load()?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}
