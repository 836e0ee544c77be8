use serde::Serialize;

use crate::telemetry::Sample;

/// Timestamp format used in the durable log.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

/// Column headers, in persisted order.
pub const HEADERS: [&str; 6] = [
    "Timestamp",
    "Voltage (V)",
    "Current (A)",
    "Power (W)",
    "Energy (kWh)",
    "Status",
];

/// One persisted row: a sample's derived values plus the cumulative energy
/// counter and on/off status.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Voltage (V)")]
    pub voltage: f64,
    #[serde(rename = "Current (A)")]
    pub current: f64,
    #[serde(rename = "Power (W)")]
    pub power: f64,
    #[serde(rename = "Energy (kWh)")]
    pub energy: f64,
    #[serde(rename = "Status")]
    pub status: String,
}

impl LogRecord {
    pub fn from_sample(sample: &Sample, energy_kwh: f64) -> Self {
        LogRecord {
            timestamp: sample.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            voltage: sample.voltage,
            current: sample.current,
            power: sample.power,
            // persisted at 6 decimals; the raw total lives in EnergyState
            energy: (energy_kwh * 1e6).round() / 1e6,
            status: if sample.switch_on { "ON" } else { "OFF" }.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    #[test]
    fn record_rounds_energy_and_formats_status() {
        let sample = Sample {
            voltage: 220.5,
            current: 0.452,
            power: 99.7,
            switch_on: true,
            timestamp: Local::now(),
        };
        let record = LogRecord::from_sample(&sample, 0.123_456_789);
        assert_eq!(record.energy, 0.123_457);
        assert_eq!(record.status, "ON");
        // MM/DD/YYYY HH:MM:SS
        assert_eq!(record.timestamp.len(), 19);
        assert_eq!(&record.timestamp[2..3], "/");
        assert_eq!(&record.timestamp[5..6], "/");
    }
}
