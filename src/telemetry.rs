use chrono::{DateTime, Local};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("cloud API rejected the request: {0}")]
    Api(String),

    #[error("malformed status payload: {0}")]
    Payload(String),
}

pub type Result<T> = std::result::Result<T, FetchError>;

/// One status entry as reported by the cloud API, keyed by code name.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPoint {
    pub code: String,
    pub value: serde_json::Value,
}

/// A normalized instantaneous reading from the plug.
#[derive(Debug, Clone)]
pub struct Sample {
    pub voltage: f64, // volts
    pub current: f64, // amps
    pub power: f64,   // watts
    pub switch_on: bool,
    pub timestamp: DateTime<Local>,
}

// Scale factors for the raw device units.
const VOLTAGE_DIVISOR: f64 = 10.0; // 0.1 V units -> V
const CURRENT_DIVISOR: f64 = 1000.0; // mA -> A
const POWER_DIVISOR: f64 = 10.0; // 0.1 W units -> W

impl Sample {
    /// Normalize a status report into canonical units. A data point that is
    /// missing or carries a non-numeric value reads as 0 rather than failing
    /// the whole sample.
    pub fn from_data_points(points: &[DataPoint], timestamp: DateTime<Local>) -> Self {
        let voltage = (numeric(points, &["cur_voltage", "voltage"]) / VOLTAGE_DIVISOR).max(0.0);
        let current = (numeric(points, &["cur_current", "current"]) / CURRENT_DIVISOR).max(0.0);
        let power = (numeric(points, &["cur_power", "power"]) / POWER_DIVISOR).max(0.0);
        let switch_on = boolean(points, &["switch_1", "switch"]);
        Sample {
            voltage,
            current,
            power,
            switch_on,
            timestamp,
        }
    }
}

/// Anything the poll loop can draw samples from. The cloud client implements
/// this; tests substitute a scripted source.
pub trait TelemetrySource {
    fn fetch(&mut self) -> Result<Sample>;
}

fn find<'a>(points: &'a [DataPoint], codes: &[&str]) -> Option<&'a serde_json::Value> {
    codes
        .iter()
        .find_map(|code| points.iter().find(|p| p.code == *code).map(|p| &p.value))
}

fn numeric(points: &[DataPoint], codes: &[&str]) -> f64 {
    match find(points, codes) {
        Some(value) => value
            .as_f64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(0.0),
        None => 0.0,
    }
}

fn boolean(points: &[DataPoint], codes: &[&str]) -> bool {
    match find(points, codes) {
        Some(value) => value
            .as_bool()
            .or_else(|| value.as_i64().map(|n| n != 0))
            .unwrap_or(false),
        None => false,
    }
}
