use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::energy::EnergyState;
use crate::store::CsvStore;
use crate::store::record::LogRecord;
use crate::telemetry::TelemetrySource;

/// How often the sleep phase re-checks the stop flag.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(250);

/// Drives fetch -> integrate -> append at a fixed cadence. Owns the
/// EnergyState and the write handle exclusively; per-cycle failures are
/// logged and never terminate the loop.
pub struct Poller<S: TelemetrySource> {
    source: S,
    store: CsvStore,
    state: EnergyState,
    interval: Duration,
}

impl<S: TelemetrySource> Poller<S> {
    pub fn new(source: S, store: CsvStore, state: EnergyState, interval: Duration) -> Self {
        Poller {
            source,
            store,
            state,
            interval,
        }
    }

    pub fn state(&self) -> &EnergyState {
        &self.state
    }

    /// One poll cycle. A failed fetch leaves both the EnergyState and the log
    /// untouched. A failed append loses the row; the in-memory counter has
    /// already advanced at that point (see DESIGN.md). Returns whether a row
    /// was durably appended.
    pub fn run_cycle(&mut self, now: Instant) -> bool {
        let sample = match self.source.fetch() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Error reading cloud data: {}. Skipping this poll cycle.", e);
                return false;
            }
        };

        let energy_kwh = self.state.integrate(sample.power, now);
        let record = LogRecord::from_sample(&sample, energy_kwh);
        println!(
            "{} | Voltage: {:.1} V | Current: {:.3} A | Power: {:.1} W | Energy: {:.3} kWh | Status: {}",
            record.timestamp, sample.voltage, sample.current, sample.power, energy_kwh, record.status
        );

        if let Err(e) = self.store.append(&record) {
            warn!("Failed to append log record: {}. Row lost for this cycle.", e);
            return false;
        }
        true
    }

    /// Run until the stop flag is raised. Returns the number of cycles run.
    pub fn run(&mut self, stop: &AtomicBool) -> u64 {
        info!("Poll loop running every {:?}", self.interval);
        let mut cycles = 0u64;
        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            self.run_cycle(cycle_start);
            cycles += 1;
            sleep_until_next(self.interval, cycle_start, stop);
        }
        info!("Poll loop stopped after {} cycles", cycles);
        cycles
    }
}

/// Time left to sleep after a cycle that already consumed `spent`. Zero when
/// the cycle overran the interval.
pub fn sleep_budget(interval: Duration, spent: Duration) -> Duration {
    interval.saturating_sub(spent)
}

/// Drift-compensated sleep, sliced so the stop flag is observed promptly.
fn sleep_until_next(interval: Duration, cycle_start: Instant, stop: &AtomicBool) {
    let mut remaining = sleep_budget(interval, cycle_start.elapsed());
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        std::thread::sleep(remaining.min(STOP_CHECK_SLICE));
        remaining = sleep_budget(interval, cycle_start.elapsed());
    }
}
