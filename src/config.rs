//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field is optional; missing values take the defaults
//! below.
//!
//! ```toml
//! [link]
//! ports = ["/dev/ttyACM0", "/dev/ttyUSB0"]
//! baud_rate = 115200
//!
//! [glove]
//! tx_interval_ms = 33
//! coupling = "mirror_pip"
//! sensor_channels = [34, 35]
//!
//! [hand]
//! control_rate_hz = 250
//! active_joints = 1
//! ```

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{GloveLinkError, Result};
use crate::link::state::LinkTiming;
use crate::protocol::frame::NUM_JOINTS;
use crate::sensing::calibration::{CalibrationRange, JointCoupling};
use crate::sensing::sensor::ADC_MAX;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub glove: GloveConfig,
    #[serde(default)]
    pub hand: HandConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Link transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    /// Candidate device paths, tried in order
    #[serde(default = "default_ports")]
    pub ports: Vec<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_scan_window_ms")]
    pub scan_window_ms: u64,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_rediscover_delay_ms")]
    pub rediscover_delay_ms: u64,
}

/// Glove (transmitting role) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GloveConfig {
    #[serde(default = "default_tx_interval_ms")]
    pub tx_interval_ms: u64,

    #[serde(default)]
    pub coupling: JointCoupling,

    /// ADC channel per sensed axis, in joint order
    #[serde(default = "default_sensor_channels")]
    pub sensor_channels: Vec<u8>,

    #[serde(default = "default_calibration_min")]
    pub calibration_min: u16,

    #[serde(default = "default_calibration_max")]
    pub calibration_max: u16,
}

/// Hand (receiving role) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HandConfig {
    #[serde(default = "default_control_rate_hz")]
    pub control_rate_hz: u32,

    /// Joint travel for a normalized angle of 255, in degrees
    #[serde(default = "default_joint_travel_deg")]
    pub joint_travel_deg: f32,

    /// Number of actuated joints, starting from MCP
    #[serde(default = "default_active_joints")]
    pub active_joints: usize,

    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,

    /// Simulated joint speed limit, rad/s
    #[serde(default = "default_velocity_limit")]
    pub velocity_limit: f32,
}

/// Telemetry configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,

    #[serde(default = "default_log_interval_ms")]
    pub log_interval_ms: u64,

    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_ports() -> Vec<String> {
    crate::link::serial::DEFAULT_DEVICE_PATHS.iter().map(|p| p.to_string()).collect()
}
fn default_baud_rate() -> u32 { crate::link::serial::DEFAULT_BAUD_RATE }
fn default_scan_window_ms() -> u64 { 5000 }
fn default_retry_backoff_ms() -> u64 { 5000 }
fn default_rediscover_delay_ms() -> u64 { 500 }

fn default_tx_interval_ms() -> u64 { 33 }
fn default_sensor_channels() -> Vec<u8> { vec![34, 35] }
fn default_calibration_min() -> u16 { crate::sensing::calibration::DEFAULT_RAW_MIN }
fn default_calibration_max() -> u16 { crate::sensing::calibration::DEFAULT_RAW_MAX }

fn default_control_rate_hz() -> u32 { 250 }
fn default_joint_travel_deg() -> f32 { 90.0 }
fn default_active_joints() -> usize { 1 }
fn default_stale_after_ms() -> u64 { 500 }
fn default_velocity_limit() -> f32 { crate::control::actuator::DEFAULT_VELOCITY_LIMIT }

fn default_telemetry_enabled() -> bool { false }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10000 }
fn default_max_files_to_keep() -> usize { 10 }
fn default_log_interval_ms() -> u64 { 1000 }
fn default_log_format() -> String { "jsonl".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            baud_rate: default_baud_rate(),
            scan_window_ms: default_scan_window_ms(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rediscover_delay_ms: default_rediscover_delay_ms(),
        }
    }
}

impl Default for GloveConfig {
    fn default() -> Self {
        Self {
            tx_interval_ms: default_tx_interval_ms(),
            coupling: JointCoupling::default(),
            sensor_channels: default_sensor_channels(),
            calibration_min: default_calibration_min(),
            calibration_max: default_calibration_max(),
        }
    }
}

impl Default for HandConfig {
    fn default() -> Self {
        Self {
            control_rate_hz: default_control_rate_hz(),
            joint_travel_deg: default_joint_travel_deg(),
            active_joints: default_active_joints(),
            stale_after_ms: default_stale_after_ms(),
            velocity_limit: default_velocity_limit(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
            log_interval_ms: default_log_interval_ms(),
            format: default_log_format(),
        }
    }
}

impl LinkConfig {
    /// Retry timing for the link state machine
    pub fn timing(&self) -> LinkTiming {
        LinkTiming {
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            rediscover_delay: Duration::from_millis(self.rediscover_delay_ms),
        }
    }

    pub fn scan_window(&self) -> Duration {
        Duration::from_millis(self.scan_window_ms)
    }
}

impl GloveConfig {
    pub fn tx_interval(&self) -> Duration {
        Duration::from_millis(self.tx_interval_ms)
    }

    /// Range installed on every axis before the first calibration
    pub fn default_range(&self) -> CalibrationRange {
        CalibrationRange {
            min: self.calibration_min,
            max: self.calibration_max,
        }
    }
}

impl HandConfig {
    /// Period of one control tick
    pub fn control_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.control_rate_hz.max(1) as u64)
    }

    pub fn joint_travel_rad(&self) -> f32 {
        self.joint_travel_deg.to_radians()
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> GloveLinkError {
    GloveLinkError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use glove_link::config::Config;
    ///
    /// let config = Config::load("config/glove-link.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given and present, otherwise fall back to defaults
    ///
    /// # Errors
    ///
    /// A file that exists but fails to parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => {
                info!("Loading configuration from {}", path.as_ref().display());
                Self::load(path)
            }
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.as_ref().display());
                Ok(Self::default())
            }
            None => {
                info!("No config file given, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Link
        if self.link.ports.is_empty() || self.link.ports.iter().any(|p| p.is_empty()) {
            return Err(invalid("link ports cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600].contains(&self.link.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        for (name, value) in [
            ("scan_window_ms", self.link.scan_window_ms),
            ("retry_backoff_ms", self.link.retry_backoff_ms),
            ("rediscover_delay_ms", self.link.rediscover_delay_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        // Glove
        if self.glove.tx_interval_ms == 0 || self.glove.tx_interval_ms > 1000 {
            return Err(invalid("tx_interval_ms must be between 1 and 1000"));
        }

        let sensed_axes = self.glove.coupling.sensed_axes();
        if self.glove.sensor_channels.len() < sensed_axes {
            return Err(invalid(format!(
                "sensor_channels needs {} entries for the selected coupling",
                sensed_axes
            )));
        }

        if self.glove.calibration_max > ADC_MAX {
            return Err(invalid(format!("calibration_max must be at most {}", ADC_MAX)));
        }

        if self.glove.calibration_min >= self.glove.calibration_max {
            return Err(invalid("calibration_min must be less than calibration_max"));
        }

        // Hand
        if self.hand.control_rate_hz == 0 || self.hand.control_rate_hz > 10000 {
            return Err(invalid("control_rate_hz must be between 1 and 10000"));
        }

        if !(self.hand.joint_travel_deg > 0.0 && self.hand.joint_travel_deg <= 360.0) {
            return Err(invalid("joint_travel_deg must be greater than 0 and at most 360"));
        }

        if self.hand.active_joints == 0 || self.hand.active_joints > NUM_JOINTS {
            return Err(invalid(format!("active_joints must be between 1 and {}", NUM_JOINTS)));
        }

        if self.hand.stale_after_ms == 0 || self.hand.stale_after_ms > 60000 {
            return Err(invalid("stale_after_ms must be between 1 and 60000"));
        }

        if !(self.hand.velocity_limit > 0.0) {
            return Err(invalid("velocity_limit must be greater than 0"));
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.log_interval_ms == 0 || self.telemetry.log_interval_ms > 60000 {
            return Err(invalid("log_interval_ms must be between 1 and 60000"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if self.telemetry.format != "jsonl" {
            return Err(invalid("log format must be 'jsonl' (only supported format)"));
        }

        Ok(())
    }
}
