// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-solar-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the solar SCADA gateway
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the gateway. The configuration is backed by a
//! YAML file and validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! The application's configuration is organized as a nested structure with sections:
//! - `visualization`: Settings for the HTTP gateway server
//! - `acquisition`: Settings for the control-loop cadences and calibration
//! - `metering`: Electrical constants and noise thresholds
//! - `modbus`: Settings for the Modbus TCP server
//! - `uplink`: Settings for the collector push
//!
//! ## Usage
//!
//! ```no_run
//! use rust_solar_scada::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(8081),                       // Web port
//!     Some("0.0.0.0".to_string()),      // Web address
//!     Some(true),                       // Enable Modbus
//!     Some("0.0.0.0".to_string()),      // Modbus address
//!     Some(502),                        // Modbus port
//!     None,                             // Collector URL
//!     None,                             // Device id
//! );
//!
//! // Access configuration values
//! println!("Server port: {}", config.visualization.port);
//! ```

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};
use url::Url;

/// Configuration for the control loop and data acquisition.
///
/// This structure contains settings that control how current samples are
/// acquired from the transducer, including the two loop cadences, the
/// calibration window and the sensor fault escalation threshold.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AcquisitionConfig {
    /// Enable or disable data acquisition.
    ///
    /// When set to `false`, the control loop will not be started and the
    /// protocol gateways serve the boot snapshot. Default is `true`.
    pub enabled: bool,

    /// Fast-cadence interval in milliseconds (acquisition + uplink).
    ///
    /// Default value is 1000ms (1 second).
    pub fast_interval_ms: u64,

    /// Slow-cadence interval in milliseconds (simulation + accumulation +
    /// protocol snapshot refresh). Default value is 5000ms.
    pub slow_interval_ms: u64,

    /// Length of the boot-time noise-floor calibration window in seconds.
    ///
    /// Default is 120 seconds.
    pub calibration_secs: u64,

    /// Number of consecutive sensor read failures before the gateway
    /// reports a FAULT status. Default is 5.
    pub fault_threshold: u32,
}
// implement Default for AcquisitionConfig
impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fast_interval_ms: 1000,
            slow_interval_ms: 5000,
            calibration_secs: 120,
            fault_threshold: 5,
        }
    }
}

/// Electrical constants and noise thresholds for the metering path.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MeteringConfig {
    /// Fixed nominal grid voltage used for power derivation, volts.
    pub voltage_nominal_v: f64,

    /// Corrected currents at or below this value report exactly zero, amps.
    pub current_threshold_a: f64,

    /// Powers at or below this value report exactly zero, watts.
    pub power_threshold_w: f64,

    /// Installed plant capacity used for the capacity factor, kW.
    pub capacity_kw: f64,

    /// Offset applied to the simulated time of day, seconds. Lets a demo
    /// gateway boot straight into daylight.
    pub simulation_offset_secs: u64,
}
// implement Default for MeteringConfig
impl Default for MeteringConfig {
    fn default() -> Self {
        Self {
            voltage_nominal_v: 220.0,
            current_threshold_a: 0.01,
            power_threshold_w: 1.0,
            capacity_kw: 1.0,
            simulation_offset_secs: 0,
        }
    }
}

/// Configuration for the Modbus TCP server component.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the Modbus server
/// * `port` - TCP port number for the Modbus server (default: 502)
/// * `address` - Network address for the Modbus server to bind to (default: 127.0.0.1)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Enable or disable the Modbus TCP server.
    ///
    /// When set to `false`, the Modbus server will not be started.
    /// Default is `false`.
    pub enabled: bool,

    /// The TCP port the Modbus server will listen on.
    ///
    /// Valid range is 1-65534. Default value is 502, which is the standard Modbus TCP port.
    pub port: u16,

    /// The network address the Modbus server will bind to.
    ///
    /// Can be an IPv4/IPv6 address. Default is "127.0.0.1".
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    pub address: String,
}
// implement Default for ModbusConfig
impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 502,
            address: "127.0.0.1".to_string(),
        }
    }
}

/// Configuration for the collector uplink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UplinkConfig {
    /// Enable or disable the periodic push to the collector.
    ///
    /// Default is `false`.
    pub enabled: bool,

    /// Collector endpoint receiving one JSON payload per fast tick.
    pub collector_url: String,

    /// Device identifier included in every payload.
    pub device_id: String,

    /// Total timeout for one send in milliseconds; on expiry the payload is
    /// dropped for that tick. Default is 3000ms.
    pub timeout_ms: u64,
}
// implement Default for UplinkConfig
impl Default for UplinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            collector_url: "http://127.0.0.1:5000/api/energy-data".to_string(),
            device_id: "SOLAR-GW-001".to_string(),
            timeout_ms: 3000,
        }
    }
}

/// Configuration for the HTTP gateway server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// The TCP port the server will listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the server will bind to.
    #[serde(default = "default_address")]
    pub address: String,

    /// Server identity string sent in the `Server` header.
    #[serde(default = "default_name")]
    pub name: String,

    /// Enable or disable the HTTP gateway.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    format!("SolarScadaApiServer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_enabled() -> bool {
    true
}

// implement Default for VisualizationConfig
impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            name: default_name(),
            enabled: default_enabled(),
        }
    }
}

/// Root configuration structure for the solar SCADA gateway.
///
/// # Structure
///
/// The configuration is designed to be deserialized from and serialized to YAML
/// using the serde framework. The structure is validated against a JSON schema
/// to ensure all required fields are present and have valid values.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, allowing for minimal configuration when custom settings
/// are not required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Settings for the HTTP gateway server component.
    #[serde(default)]
    pub visualization: VisualizationConfig,

    /// Control-loop and acquisition settings.
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Electrical constants and noise thresholds.
    #[serde(default)]
    pub metering: MeteringConfig,

    /// Modbus TCP server settings.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Collector uplink settings.
    #[serde(default)]
    pub uplink: UplinkConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        // Validate before deserializing to Config
        debug!("Validating {} configuration against schema", path.display());
        if let Err(e) = Self::validate_json(&json_value) {
            error!("Configuration validation error before deserialization");
            // Generate a config.sample.yaml file with the default values
            // for the user to edit
            Self::create_sample_config(path)?;
            return Err(e);
        }

        // Now that YAML has been validated, deserialize to Config
        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                match Self::create_sample_config(path) {
                    Ok(_) => debug!("Successfully created sample config"),
                    Err(e) => error!("Failed to create sample config: {}", e),
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        // Perform additional specific validations
        if let Err(err) = config.validate_specific_rules() {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Validate this configuration (schema plus specific rules).
    pub fn validate(&self) -> Result<()> {
        let json_value =
            serde_json::to_value(self).context("Failed to serialize configuration to JSON")?;
        Self::validate_json(&json_value)?;
        self.validate_specific_rules()
    }

    fn validate_json(json_value: &serde_json::Value) -> Result<()> {
        let schema_str = include_str!("../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        if let Err(error) = validator.validate(json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }
        Ok(())
    }

    /// Rules the schema cannot express.
    fn validate_specific_rules(&self) -> Result<()> {
        if self.visualization.address.parse::<IpAddr>().is_err() {
            anyhow::bail!(
                "visualization.address is not a valid IP address: {}",
                self.visualization.address
            );
        }
        if self.modbus.address.parse::<IpAddr>().is_err() {
            anyhow::bail!(
                "modbus.address is not a valid IP address: {}",
                self.modbus.address
            );
        }
        if self.acquisition.fast_interval_ms == 0 || self.acquisition.slow_interval_ms == 0 {
            anyhow::bail!("acquisition intervals must be non-zero");
        }
        if self.acquisition.fast_interval_ms > self.acquisition.slow_interval_ms {
            anyhow::bail!(
                "acquisition.fast_interval_ms ({}) must not exceed slow_interval_ms ({})",
                self.acquisition.fast_interval_ms,
                self.acquisition.slow_interval_ms
            );
        }
        if self.acquisition.fault_threshold == 0 {
            anyhow::bail!("acquisition.fault_threshold must be at least 1");
        }
        if self.metering.voltage_nominal_v <= 0.0 {
            anyhow::bail!("metering.voltage_nominal_v must be positive");
        }
        if self.metering.current_threshold_a < 0.0 || self.metering.power_threshold_w < 0.0 {
            anyhow::bail!("metering noise thresholds must not be negative");
        }
        if self.uplink.enabled {
            Url::parse(&self.uplink.collector_url).with_context(|| {
                format!(
                    "uplink.collector_url is not a valid URL: {}",
                    self.uplink.collector_url
                )
            })?;
            if self.uplink.device_id.is_empty() {
                anyhow::bail!("uplink.device_id must not be empty");
            }
            if self.uplink.timeout_ms == 0 {
                anyhow::bail!("uplink.timeout_ms must be non-zero");
            }
        }
        Ok(())
    }

    /// Write a `config.sample.yaml` with default values next to the
    /// rejected file for the user to edit.
    fn create_sample_config(path: &Path) -> Result<()> {
        let sample_path = path.with_file_name("config.sample.yaml");
        debug!("Writing sample configuration to {:?}", sample_path);
        Self::default().save_to_file(&sample_path)
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided will override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `web_port` - TCP port for the HTTP gateway server
    /// * `web_address` - Network address for the HTTP gateway to bind to
    /// * `modbus_enabled` - Optional flag to enable/disable the Modbus server
    /// * `modbus_address` - Optional network address for the Modbus server
    /// * `modbus_port` - Optional TCP port for the Modbus server
    /// * `collector_url` - Optional collector endpoint (enables the uplink)
    /// * `device_id` - Optional device identifier for uplink payloads
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        web_port: Option<u16>,
        web_address: Option<String>,
        modbus_enabled: Option<bool>,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        collector_url: Option<String>,
        device_id: Option<String>,
    ) {
        if let Some(port) = web_port {
            self.visualization.port = port;
        }
        if let Some(address) = web_address {
            self.visualization.address = address;
        }
        if let Some(enabled) = modbus_enabled {
            self.modbus.enabled = enabled;
        }
        if let Some(address) = modbus_address {
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            self.modbus.port = port;
        }
        if let Some(url) = collector_url {
            self.uplink.collector_url = url;
            self.uplink.enabled = true;
        }
        if let Some(id) = device_id {
            self.uplink.device_id = id;
        }
    }
}
