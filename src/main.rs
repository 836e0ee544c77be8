mod config;
mod devices;
mod energy;
mod poller;
mod store;
mod telemetry;
mod view;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::fmt;

use config::Config;
use devices::SmartPlug;
use energy::EnergyState;
use poller::Poller;
use store::CsvStore;
use store::record::TIMESTAMP_FORMAT;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Keep the guard alive for the lifetime of the process so buffered log
    // lines reach the file.
    let _guard = setup_logging();
    info!("Starting powerpulse");

    let config_path =
        std::env::var("POWERPULSE_CONFIG").unwrap_or_else(|_| "powerpulse.json".into());
    let config = Config::load(&config_path)?;

    let mode = std::env::args().nth(1).unwrap_or_else(|| "run".into());
    let result = match mode.as_str() {
        "run" => run_collector(&config),
        "summary" => {
            print_summary(&config);
            Ok(())
        }
        "on" => set_switch(&config, true),
        "off" => set_switch(&config, false),
        other => {
            eprintln!("Unknown mode: {other} (expected run | summary | on | off)");
            std::process::exit(2);
        }
    };

    if let Err(e) = &result {
        error!("Fatal: {}", e);
        eprintln!("Fatal: {e}");
    } else {
        info!("Shutting down");
    }
    result
}

/// The collector: connect to the cloud, resume the energy counter from the
/// durable log, then poll until Ctrl+C.
fn run_collector(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut plug = SmartPlug::new(config)?;
    match plug.connect() {
        Ok(()) => {
            info!("Connected to cloud API for device {}", config.device_id);
            println!("Successfully connected to the cloud API.");
        }
        Err(e) => {
            error!("Could not connect to the cloud API: {}", e);
            return Err(Box::new(e));
        }
    }

    let store = CsvStore::new(&config.csv_path);
    store.initialize()?;

    let now = Instant::now();
    let state = match energy::resume_energy(&store) {
        Some(kwh) => {
            info!("Resuming energy counter from {:.3} kWh", kwh);
            println!("Resuming energy counter from: {kwh:.3} kWh");
            EnergyState::resume(kwh, now)
        }
        None => EnergyState::new(now),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })?;

    println!(
        "Cloud logging started, writing to {}... Press Ctrl+C to stop.",
        store.path().display()
    );
    let mut poller = Poller::new(
        plug,
        store,
        state,
        Duration::from_secs(config.poll_interval_secs),
    );
    poller.run(&stop);
    println!(
        "Logging stopped. Energy counter at {:.3} kWh.",
        poller.state().cumulative_kwh()
    );
    Ok(())
}

/// Read-side: load the log and print summary metrics plus the recent rows.
fn print_summary(config: &Config) {
    let store = CsvStore::new(&config.csv_path);
    let readings = view::load(&store);
    if readings.len() < 2 {
        println!(
            "Waiting for data. Ensure '{}' has at least 2 rows of data.",
            config.csv_path
        );
        return;
    }

    let Some(summary) = view::summarize(&readings, config.cost_per_kwh) else {
        println!("No numeric energy data recorded yet.");
        return;
    };
    println!(
        "Total Accumulated Energy: {:.3} kWh",
        summary.total_energy_kwh
    );
    println!("Peak Power Recorded: {:.1} W", summary.peak_power_w);
    println!("Estimated Total Cost: {:.2}", summary.estimated_cost);
    if let Some((power_delta, energy_delta)) = view::latest_delta(&readings) {
        println!("Last cycle delta: {power_delta:+.1} W, {energy_delta:+.3} kWh");
    }

    println!("\nRecent Data Log:");
    let start = readings.len().saturating_sub(10);
    for reading in &readings[start..] {
        println!(
            "{} | {} V | {} A | {} W | {} kWh | {}",
            reading.timestamp.format(TIMESTAMP_FORMAT),
            column(reading.voltage, 1),
            column(reading.current, 3),
            column(reading.power, 1),
            column(reading.energy, 3),
            reading.status
        );
    }
}

fn column(value: Option<f64>, precision: usize) -> String {
    match value {
        Some(v) => format!("{v:>8.precision$}"),
        None => format!("{:>8}", "-"),
    }
}

/// Control plane: forward an on/off command and report the resulting state.
fn set_switch(config: &Config, on: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut plug = SmartPlug::new(config)?;
    plug.set_switch(on)?;
    let (switch_on, power) = plug.get_status()?;
    println!(
        "Device is now {} ({power:.1} W)",
        if switch_on { "ON" } else { "OFF" }
    );
    Ok(())
}

fn setup_logging() -> tracing_appender::non_blocking::WorkerGuard {
    // File-based logging with daily rotation
    let file_appender = rolling::daily("logs", "powerpulse.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    fmt()
        .with_writer(non_blocking)
        .with_ansi(false) // Disable ANSI colors in log files
        .with_level(true)
        .init();

    guard
}
