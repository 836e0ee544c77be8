use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use csv::StringRecord;
use tracing::warn;

use crate::store::CsvStore;
use crate::store::record::TIMESTAMP_FORMAT;

/// One log row as seen by the read side. Numeric columns that fail to parse
/// carry `None` instead of failing the whole load.
#[derive(Debug, Clone)]
pub struct Reading {
    pub timestamp: NaiveDateTime,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub energy: Option<f64>,
    pub status: String,
}

/// Load the full log: parse, drop rows with unparseable timestamps,
/// deduplicate by timestamp (last write wins) and sort ascending. A missing
/// or empty store yields an empty sequence, never an error.
pub fn load(store: &CsvStore) -> Vec<Reading> {
    let rows = match store.load_all() {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Failed to load log store: {}", e);
            return Vec::new();
        }
    };

    let mut by_time: BTreeMap<NaiveDateTime, Reading> = BTreeMap::new();
    for row in rows {
        let Some(field) = row.get(0) else { continue };
        let Ok(timestamp) = NaiveDateTime::parse_from_str(field.trim(), TIMESTAMP_FORMAT) else {
            continue;
        };
        by_time.insert(
            timestamp,
            Reading {
                timestamp,
                voltage: number(&row, 1),
                current: number(&row, 2),
                power: number(&row, 3),
                energy: number(&row, 4),
                status: row.get(5).unwrap_or("").trim().to_string(),
            },
        );
    }
    by_time.into_values().collect()
}

fn number(row: &StringRecord, index: usize) -> Option<f64> {
    row.get(index).and_then(|field| field.trim().parse().ok())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub total_energy_kwh: f64,
    pub peak_power_w: f64,
    pub estimated_cost: f64,
}

/// Summary metrics over the loaded log. `None` when no row carries a numeric
/// energy value, so an empty or header-only store shows "waiting" rather than
/// NaN.
pub fn summarize(readings: &[Reading], cost_per_kwh: f64) -> Option<Summary> {
    let total_energy_kwh = readings
        .iter()
        .filter_map(|r| r.energy)
        .fold(f64::NAN, f64::max);
    if !total_energy_kwh.is_finite() {
        return None;
    }
    let peak_power_w = readings.iter().filter_map(|r| r.power).fold(0.0, f64::max);
    Some(Summary {
        total_energy_kwh,
        peak_power_w,
        estimated_cost: total_energy_kwh * cost_per_kwh,
    })
}

/// Power and energy change between the two most recent readings, when both
/// carry numeric values.
pub fn latest_delta(readings: &[Reading]) -> Option<(f64, f64)> {
    if readings.len() < 2 {
        return None;
    }
    let last = &readings[readings.len() - 1];
    let previous = &readings[readings.len() - 2];
    Some((
        last.power? - previous.power?,
        last.energy? - previous.energy?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(contents: &str) -> (tempfile::TempDir, CsvStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, CsvStore::new(path))
    }

    const HEADER: &str = "Timestamp,Voltage (V),Current (A),Power (W),Energy (kWh),Status\n";

    #[test]
    fn missing_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("absent.csv"));
        assert!(load(&store).is_empty());
    }

    #[test]
    fn header_only_store_loads_empty_and_summarizes_as_none() {
        let (_dir, store) = store_with(HEADER);
        let readings = load(&store);
        assert!(readings.is_empty());
        assert!(summarize(&readings, 7.50).is_none());
    }

    #[test]
    fn rows_are_sorted_ascending_regardless_of_file_order() {
        let (_dir, store) = store_with(&format!(
            "{HEADER}\
             01/02/2026 10:00:10,220.0,0.5,110.0,0.002,ON\n\
             01/02/2026 10:00:00,220.0,0.5,100.0,0.001,ON\n"
        ));
        let readings = load(&store);
        assert_eq!(readings.len(), 2);
        assert!(readings[0].timestamp < readings[1].timestamp);
        assert_eq!(readings[0].power, Some(100.0));
    }

    #[test]
    fn duplicate_timestamps_collapse_to_last_occurrence() {
        let (_dir, store) = store_with(&format!(
            "{HEADER}\
             01/02/2026 10:00:00,220.0,0.5,100.0,0.001,ON\n\
             01/02/2026 10:00:00,221.0,0.5,105.0,0.002,ON\n"
        ));
        let readings = load(&store);
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].voltage, Some(221.0));
        assert_eq!(readings[0].energy, Some(0.002));
    }

    #[test]
    fn load_is_idempotent_without_writes() {
        let (_dir, store) = store_with(&format!(
            "{HEADER}\
             01/02/2026 10:00:00,220.0,0.5,100.0,0.001,ON\n\
             01/02/2026 10:00:05,220.0,0.5,100.0,0.002,OFF\n"
        ));
        let first = load(&store);
        let second = load(&store);
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(a.timestamp, b.timestamp);
            assert_eq!(a.energy, b.energy);
            assert_eq!(a.status, b.status);
        }
    }

    #[test]
    fn bad_timestamps_drop_and_bad_numerics_carry_none() {
        let (_dir, store) = store_with(&format!(
            "{HEADER}\
             not-a-timestamp,220.0,0.5,100.0,0.001,ON\n\
             01/02/2026 10:00:00,glitch,0.5,100.0,0.001,ON\n\
             01/02/2026 10:00:05,220.0,0.5\n"
        ));
        let readings = load(&store);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].voltage, None);
        assert_eq!(readings[0].power, Some(100.0));
        // the partial trailing row keeps its parsed prefix, absent fields are None
        assert_eq!(readings[1].current, Some(0.5));
        assert_eq!(readings[1].energy, None);
    }

    #[test]
    fn summary_takes_max_energy_and_power() {
        let (_dir, store) = store_with(&format!(
            "{HEADER}\
             01/02/2026 10:00:00,220.0,0.5,100.0,0.001,ON\n\
             01/02/2026 10:00:05,220.0,0.9,199.5,1.234,ON\n\
             01/02/2026 10:00:10,220.0,0.2,44.0,1.234,OFF\n"
        ));
        let summary = summarize(&load(&store), 7.50).unwrap();
        assert!((summary.total_energy_kwh - 1.234).abs() < 1e-9);
        assert!((summary.peak_power_w - 199.5).abs() < 1e-9);
        assert!((summary.estimated_cost - 9.255).abs() < 1e-9);
    }

    #[test]
    fn latest_delta_needs_two_numeric_rows() {
        let (_dir, store) = store_with(&format!(
            "{HEADER}01/02/2026 10:00:00,220.0,0.5,100.0,0.001,ON\n"
        ));
        let readings = load(&store);
        assert!(latest_delta(&readings).is_none());

        let (_dir, store) = store_with(&format!(
            "{HEADER}\
             01/02/2026 10:00:00,220.0,0.5,100.0,0.001,ON\n\
             01/02/2026 10:00:05,220.0,0.5,150.0,0.003,ON\n"
        ));
        let readings = load(&store);
        let (power_delta, energy_delta) = latest_delta(&readings).unwrap();
        assert!((power_delta - 50.0).abs() < 1e-9);
        assert!((energy_delta - 0.002).abs() < 1e-9);
    }
}
