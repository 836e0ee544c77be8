use std::time::Duration;

use chrono::Local;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::telemetry::{DataPoint, FetchError, Sample, TelemetrySource};

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("device credentials are incomplete: {0}")]
    Credentials(String),

    #[error("status probe failed: {0}")]
    Probe(#[from] FetchError),
}

/// Device status envelope returned by the cloud API.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    result: Vec<DataPoint>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    msg: Option<String>,
}

/// Cloud-connected smart plug. One HTTP client is built at startup with a
/// request timeout shorter than the poll interval so a hung fetch cannot
/// cascade into missed cycles.
pub struct SmartPlug {
    client: Client,
    base_url: String,
    device_id: String,
    api_key: String,
    api_secret: String,
}

impl SmartPlug {
    pub fn new(config: &Config) -> Result<Self, ConnectError> {
        info!(
            "Initializing smart plug client for device {}",
            config.device_id
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(ConnectError::Client)?;
        Ok(SmartPlug {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            device_id: config.device_id.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// Verify credentials with one status round-trip. Called once at startup;
    /// a failure here is fatal, no polling can proceed.
    pub fn connect(&mut self) -> Result<(), ConnectError> {
        if self.api_key.is_empty() || self.api_secret.is_empty() || self.device_id.is_empty() {
            return Err(ConnectError::Credentials(
                "api_key, api_secret and device_id must all be set".into(),
            ));
        }
        info!("Probing cloud API at {}", self.base_url);
        let points = self.fetch_status()?;
        info!(
            "Cloud API reachable; device reports {} data points",
            points.len()
        );
        Ok(())
    }

    fn fetch_status(&self) -> crate::telemetry::Result<Vec<DataPoint>> {
        let url = format!(
            "{}/v1.0/iot-03/devices/{}/status",
            self.base_url, self.device_id
        );
        let response = self
            .client
            .get(&url)
            .header("client_id", &self.api_key)
            .header("secret", &self.api_secret)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api(format!("HTTP {}", status)));
        }
        let body: StatusResponse = response
            .json()
            .map_err(|e| FetchError::Payload(e.to_string()))?;
        if !body.success {
            return Err(FetchError::Api(
                body.msg.unwrap_or_else(|| "unspecified error".into()),
            ));
        }
        Ok(body.result)
    }

    /// Control plane: forward an on/off command to the device.
    pub fn set_switch(&self, on: bool) -> crate::telemetry::Result<()> {
        let url = format!(
            "{}/v1.0/iot-03/devices/{}/commands",
            self.base_url, self.device_id
        );
        info!("Sending switch command: {}", if on { "ON" } else { "OFF" });
        let response = self
            .client
            .post(&url)
            .header("client_id", &self.api_key)
            .header("secret", &self.api_secret)
            .json(&json!({ "commands": [{ "code": "switch_1", "value": on }] }))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api(format!("HTTP {}", status)));
        }
        let body: CommandResponse = response
            .json()
            .map_err(|e| FetchError::Payload(e.to_string()))?;
        if !body.success {
            return Err(FetchError::Api(
                body.msg.unwrap_or_else(|| "command rejected".into()),
            ));
        }
        Ok(())
    }

    /// Control plane: current switch state and power draw.
    pub fn get_status(&mut self) -> crate::telemetry::Result<(bool, f64)> {
        let sample = self.fetch()?;
        Ok((sample.switch_on, sample.power))
    }
}

impl TelemetrySource for SmartPlug {
    fn fetch(&mut self) -> crate::telemetry::Result<Sample> {
        let points = self.fetch_status()?;
        Ok(Sample::from_data_points(&points, Local::now()))
    }
}
