use std::error::Error;
use std::time::Duration as StdDuration;

use clap::Subcommand;
use drysense_core::session::TickScheduler;
use drysense_core::storage::data_dir;
use drysense_core::weather::{FileSensors, OpenMeteoClient, WeatherAggregator};
use drysense_core::{
    Clock, Config, Database, DryerDevice, DryingRecord, DryingSession, Event, SystemClock,
};

const SESSION_KEY: &str = "drying_session";

pub type Device = DryerDevice<FileSensors, OpenMeteoClient, SystemClock>;

#[derive(Subcommand)]
pub enum SessionCommand {
    /// Start a new drying session from 0%
    Start,
    /// Pause the running session
    Pause,
    /// Continue a paused session, keeping progress
    Resume,
    /// Mark the laundry dry and learn from the elapsed time
    Dry,
    /// Back to ready, keeping calibration
    Reset,
    /// Forget the learned calibration factor
    ResetCalibration,
    /// Fetch the weather and tick immediately
    Refresh,
    /// Print the current attributes as JSON
    Status,
    /// Flag stale weather if ticks have stopped
    Health,
}

/// The stored session, or a fresh one on first run. An unreadable value is
/// an error so that saving never overwrites the learned calibration.
fn load_session(db: &Database) -> Result<DryingSession, Box<dyn Error>> {
    match db.kv_get(SESSION_KEY)? {
        Some(json) => serde_json::from_str(&json).map_err(|e| {
            format!("stored session is unreadable ({e}); fix or delete key '{SESSION_KEY}'").into()
        }),
        None => Ok(DryingSession::new()),
    }
}

fn save_session(db: &Database, session: &DryingSession) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string(session)?;
    db.kv_set(SESSION_KEY, &json)?;
    Ok(())
}

pub fn sensor_file() -> Result<FileSensors, Box<dyn Error>> {
    Ok(FileSensors::new(data_dir()?.join("sensors.json")))
}

fn build_device(config: &Config, session: DryingSession) -> Result<Device, Box<dyn Error>> {
    config.validate()?;
    let remote = OpenMeteoClient::new(
        &config.weather.endpoint,
        StdDuration::from_secs(config.weather.timeout_secs),
    )?;
    let weather = WeatherAggregator::new(
        sensor_file()?,
        remote,
        config.sensor_map()?,
        config.weather_settings(),
    );
    Ok(DryerDevice::with_session(
        config.device_settings(),
        weather,
        SystemClock,
        session,
    ))
}

/// Completed sessions go to the drying log.
fn record(db: &Database, event: &Event) -> Result<(), Box<dyn Error>> {
    if let Some(rec) = DryingRecord::from_event(event) {
        db.record_drying(&rec)?;
    }
    Ok(())
}

pub fn run(command: SessionCommand) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut device = build_device(&config, load_session(&db)?)?;

    let event = match command {
        SessionCommand::Start => device.start(),
        SessionCommand::Pause => device.pause(),
        SessionCommand::Resume => device.resume(),
        SessionCommand::Dry => device.mark_dry(),
        SessionCommand::Reset => device.reset(),
        SessionCommand::ResetCalibration => device.reset_calibration(),
        SessionCommand::Refresh => device.tick(),
        SessionCommand::Status => None,
        SessionCommand::Health => device.health_check(),
    };

    if let Some(event) = &event {
        record(&db, event)?;
    }
    save_session(&db, device.session())?;

    let output = serde_json::json!({
        "event": event,
        "attributes": device.attributes(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Foreground scheduler loop. The session is reloaded before every round so
/// commands issued from another shell take effect.
pub fn watch(rounds: Option<u32>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut device = build_device(&config, load_session(&db)?)?;
    let mut scheduler =
        TickScheduler::new(config.device.update_interval_min, device.clock().now());
    tracing::info!(
        interval_min = config.device.update_interval_min,
        "watching drying session"
    );

    let mut round = 0;
    loop {
        match load_session(&db) {
            Ok(session) => {
                device.restore(session);
                for event in device.run_due(&mut scheduler) {
                    record(&db, &event)?;
                    println!("{}", serde_json::to_string(&event)?);
                }
                save_session(&db, device.session())?;
            }
            // Leave the stored session alone and try again next round.
            Err(e) => tracing::warn!("skipping round: {e}"),
        }

        round += 1;
        if rounds.is_some_and(|max| round >= max) {
            return Ok(());
        }

        let wait = scheduler.next_due() - device.clock().now();
        std::thread::sleep(wait.to_std().unwrap_or(StdDuration::ZERO));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_session_starts_fresh() {
        let db = Database::open_memory().unwrap();
        let session = load_session(&db).unwrap();
        assert_eq!(session.calibration().session_count(), 0);
    }

    #[test]
    fn stored_session_keeps_calibration() {
        let db = Database::open_memory().unwrap();
        let session =
            DryingSession::with_calibration(drysense_core::CalibrationLearner::from_parts(1.8, 6));
        save_session(&db, &session).unwrap();
        let loaded = load_session(&db).unwrap();
        assert_eq!(loaded.calibration().factor(), 1.8);
        assert_eq!(loaded.calibration().session_count(), 6);
    }

    #[test]
    fn unreadable_session_is_an_error() {
        let db = Database::open_memory().unwrap();
        db.kv_set(SESSION_KEY, "{not json").unwrap();
        let err = load_session(&db).unwrap_err();
        assert!(err.to_string().contains("unreadable"));
        assert_eq!(db.kv_get(SESSION_KEY).unwrap().as_deref(), Some("{not json"));
    }
}
