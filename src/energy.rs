use std::time::Instant;

use crate::store::CsvStore;
use crate::view;

/// Running energy total plus the instant of the last successful integration.
/// Owned exclusively by the poll loop; the counter never decreases while the
/// process runs.
#[derive(Debug)]
pub struct EnergyState {
    cumulative_kwh: f64,
    last_poll: Instant,
}

impl EnergyState {
    /// Fresh start at zero.
    pub fn new(now: Instant) -> Self {
        EnergyState {
            cumulative_kwh: 0.0,
            last_poll: now,
        }
    }

    /// Resume from a previously persisted total. `last_poll` is set to `now`,
    /// not the last log timestamp, so an idle gap between process stop and
    /// restart is never charged as consumption.
    pub fn resume(cumulative_kwh: f64, now: Instant) -> Self {
        EnergyState {
            cumulative_kwh,
            last_poll: now,
        }
    }

    pub fn cumulative_kwh(&self) -> f64 {
        self.cumulative_kwh
    }

    /// Left-rectangle integration of instantaneous power over the actual
    /// wall-clock gap since the last successful poll. Returns the new total.
    pub fn integrate(&mut self, power_w: f64, now: Instant) -> f64 {
        // saturating_duration_since clamps a non-monotonic `now` to zero elapsed
        let elapsed = now.saturating_duration_since(self.last_poll);
        self.cumulative_kwh += power_w * elapsed.as_secs_f64() / 3600.0 / 1000.0;
        self.last_poll = now;
        self.cumulative_kwh
    }
}

/// Last persisted energy value, if the log already has at least one valid
/// data row. The durable log is the single source of truth for resumption.
pub fn resume_energy(store: &CsvStore) -> Option<f64> {
    view::load(store).iter().rev().find_map(|r| r.energy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn integration_sums_power_times_elapsed() {
        let t0 = Instant::now();
        let mut state = EnergyState::new(t0);
        let windows = [(100.0, 5), (250.0, 10), (0.0, 5), (60.0, 3600)];

        let mut at = t0;
        let mut expected = 0.0;
        for (power_w, secs) in windows {
            at += Duration::from_secs(secs);
            state.integrate(power_w, at);
            expected += power_w * secs as f64 / 3_600_000.0;
        }
        assert!((state.cumulative_kwh() - expected).abs() < 1e-12);
    }

    #[test]
    fn counter_never_decreases() {
        let t0 = Instant::now();
        let mut state = EnergyState::new(t0);
        let mut previous = 0.0;
        for i in 1..=50 {
            let total = state.integrate((i % 7) as f64 * 10.0, t0 + Duration::from_secs(i * 5));
            assert!(total >= previous);
            previous = total;
        }
    }

    #[test]
    fn out_of_order_now_adds_nothing() {
        let t0 = Instant::now();
        let mut state = EnergyState::resume(1.5, t0 + Duration::from_secs(10));
        // now is earlier than last_poll; elapsed clamps to zero
        let total = state.integrate(500.0, t0);
        assert_eq!(total, 1.5);
    }

    #[test]
    fn resume_uses_persisted_total_as_base() {
        let t0 = Instant::now();
        let mut state = EnergyState::resume(2.345, t0);
        let total = state.integrate(100.0, t0 + Duration::from_secs(36));
        // 100 W for 36 s is exactly 0.001 kWh on top of the resumed base
        assert!((total - 2.346).abs() < 1e-9);
    }
}
