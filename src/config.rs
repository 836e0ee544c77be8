use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

pub const MIN_POLL_INTERVAL_SECS: u64 = 2;
pub const MAX_POLL_INTERVAL_SECS: u64 = 60;

const DEFAULT_CSV_PATH: &str = "demo.csv";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_COST_PER_KWH: f64 = 7.50;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub device_id: String,
    pub csv_path: String,
    pub poll_interval_secs: u64,
    pub cost_per_kwh: f64,
    pub fetch_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: "https://openapi.tuyaeu.com".into(),
            api_key: std::env::var("TUYA_API_KEY").unwrap_or_default(),
            api_secret: std::env::var("TUYA_API_SECRET").unwrap_or_default(),
            device_id: std::env::var("TUYA_DEVICE_ID").unwrap_or_default(),
            csv_path: DEFAULT_CSV_PATH.into(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            cost_per_kwh: DEFAULT_COST_PER_KWH,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Load JSON config from disk. A missing file falls back to defaults
    /// (credentials from the environment); a malformed file is fatal.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Config::default().sanitized());
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)?;
        Ok(config.sanitized())
    }

    /// Clamp out-of-range values instead of refusing to start.
    fn sanitized(mut self) -> Self {
        if self.poll_interval_secs < MIN_POLL_INTERVAL_SECS
            || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS
        {
            let clamped = self
                .poll_interval_secs
                .clamp(MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS);
            warn!(
                "poll_interval_secs {} out of range [{}, {}], using {}",
                self.poll_interval_secs, MIN_POLL_INTERVAL_SECS, MAX_POLL_INTERVAL_SECS, clamped
            );
            self.poll_interval_secs = clamped;
        }
        if !(self.cost_per_kwh > 0.0) {
            warn!(
                "cost_per_kwh {} must be positive, using {}",
                self.cost_per_kwh, DEFAULT_COST_PER_KWH
            );
            self.cost_per_kwh = DEFAULT_COST_PER_KWH;
        }
        // a hung fetch must not outlast the poll interval
        if self.fetch_timeout_secs >= self.poll_interval_secs {
            let clamped = self.poll_interval_secs - 1;
            warn!(
                "fetch_timeout_secs {} must stay below the poll interval, using {}",
                self.fetch_timeout_secs, clamped
            );
            self.fetch_timeout_secs = clamped;
        }
        self
    }
}
