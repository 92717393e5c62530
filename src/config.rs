/// Config module - process configuration for the relay
///
/// Loaded once from TOML at startup, validated, then passed by reference
/// into every component constructor. Nothing here is reloaded mid-run.
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::codec::FrameLayout;
use crate::errors::{Result, StreamError};
use crate::facade::SimulationSettings;
use crate::registry::DeviceRegistry;
use crate::retry::RetryPolicy;

/// Output rates the trackers accept.
pub const SUPPORTED_RATES_HZ: [u32; 8] = [1, 4, 10, 12, 15, 20, 30, 60];

/// One tracker, in row order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    /// Body location label used in logs and for `master_device`
    pub name: String,
    /// Hardware identifier reported by the sensor network
    pub serial: String,
}

/// Network endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Controller address frames are sent to
    pub destination: String,

    /// Local address of the send socket
    #[serde(default = "default_send_bind")]
    pub send_bind: String,

    /// When set, frames are also received and decoded here after each send
    #[serde(default)]
    pub loopback_bind: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); `RUST_LOG` wins
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Top-level relay configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Trackers; array order defines frame row order
    pub devices: Vec<DeviceEntry>,

    /// Name of the tracker relaying for the others
    pub master_device: String,

    pub sampling_rate_hz: u32,

    /// Capture and transmit orientation quaternions
    #[serde(default)]
    pub orientation: bool,

    /// Ask the sensor network to synchronise tracker clocks
    #[serde(default = "default_true")]
    pub sync_devices: bool,

    /// Append the per-tracker counter block to every frame
    #[serde(default = "default_true")]
    pub append_counters: bool,

    pub network: NetworkConfig,

    #[serde(default)]
    pub connect: RetryPolicy,

    #[serde(default)]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_true() -> bool {
    true
}

fn default_send_bind() -> String {
    "0.0.0.0:0".to_string()
}

fn parse_addr(field: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| StreamError::Config(format!("{} {:?} is not a socket address: {}", field, value, e)))
}

impl StreamConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: StreamConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pump cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.devices.is_empty() {
            return Err(StreamError::Config("at least one device is required".into()));
        }

        let mut names = HashSet::new();
        let mut serials = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() || device.serial.trim().is_empty() {
                return Err(StreamError::Config("device name and serial must be non-empty".into()));
            }
            if !names.insert(device.name.as_str()) {
                return Err(StreamError::Config(format!("duplicate device name {:?}", device.name)));
            }
            if !serials.insert(device.serial.as_str()) {
                return Err(StreamError::Config(format!(
                    "duplicate device serial {:?}",
                    device.serial
                )));
            }
        }

        if self.master_serial().is_none() {
            return Err(StreamError::Config(format!(
                "master_device {:?} does not name a configured device",
                self.master_device
            )));
        }

        if !SUPPORTED_RATES_HZ.contains(&self.sampling_rate_hz) {
            return Err(StreamError::Config(format!(
                "sampling_rate_hz {} not in {:?}",
                self.sampling_rate_hz, SUPPORTED_RATES_HZ
            )));
        }

        if self.connect.max_attempts == 0 {
            return Err(StreamError::Config("connect.max_attempts must be at least 1".into()));
        }

        for (field, p) in [
            ("simulation.dropout_probability", self.simulation.dropout_probability),
            ("simulation.gap_probability", self.simulation.gap_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(StreamError::Config(format!("{} must be within [0, 1]", field)));
            }
        }

        if !self.simulation.noise_std.is_finite() || self.simulation.noise_std < 0.0 {
            return Err(StreamError::Config(
                "simulation.noise_std must be finite and non-negative".into(),
            ));
        }

        let destination = self.destination()?;
        self.send_bind()?;
        if let Some(loopback) = self.loopback_bind()? {
            // The loop-back socket must be the one frames are sent to
            let ip_matches = loopback.ip().is_unspecified() || loopback.ip() == destination.ip();
            if loopback.port() != destination.port() || !ip_matches {
                return Err(StreamError::Config(format!(
                    "network.loopback_bind {} does not receive frames sent to {}",
                    loopback, destination
                )));
            }
        }

        let frame_len = self.frame_layout().frame_len();
        if frame_len > crate::MAX_PAYLOAD_SIZE {
            return Err(StreamError::PayloadTooLarge {
                required: frame_len,
                available: crate::MAX_PAYLOAD_SIZE,
            });
        }
        Ok(())
    }

    /// Device identifiers in row order.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.iter().map(|d| d.serial.as_str())
    }

    /// Serial of the master device, if `master_device` names one.
    pub fn master_serial(&self) -> Option<&str> {
        self.devices
            .iter()
            .find(|d| d.name == self.master_device)
            .map(|d| d.serial.as_str())
    }

    pub fn registry(&self) -> DeviceRegistry {
        DeviceRegistry::assign(self.device_ids())
    }

    pub fn frame_layout(&self) -> FrameLayout {
        FrameLayout::new(self.devices.len(), self.orientation, self.append_counters)
    }

    pub fn destination(&self) -> Result<SocketAddr> {
        parse_addr("network.destination", &self.network.destination)
    }

    pub fn send_bind(&self) -> Result<SocketAddr> {
        parse_addr("network.send_bind", &self.network.send_bind)
    }

    pub fn loopback_bind(&self) -> Result<Option<SocketAddr>> {
        self.network
            .loopback_bind
            .as_deref()
            .map(|addr| parse_addr("network.loopback_bind", addr))
            .transpose()
    }
}
