//! # Configuration Management Module
//!
//! TOML configuration for the gateway: which transports to open, the serial
//! line parameters, and which protocol each terminal speaks.
//!
//! ## Configuration Structure
//!
//! - [`UdpConfig`] - datagram listener
//! - [`SerialConfig`] - serial converter line settings and idle timeout
//! - [`DeviceConfig`] - protocol binding for one terminal address
//! - [`LoggingConfig`] - log level and optional log file
//!
//! ## Configuration File Format
//!
//! ```toml
//! [udp]
//! enabled = true
//! bind_address = "0.0.0.0"
//! port = 56000
//!
//! [serial]
//! enabled = false
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! data_bits = 8
//! parity = "none"
//! stop_bits = 1
//! flow_control = "none"
//! timeout_ms = 5000
//!
//! [[devices]]
//! ip = "192.168.1.50"
//! protocol = "HOME"
//!
//! [logging]
//! level = "info"
//! file = "ekey-gateway.log"
//! ```
//!
//! Devices not listed here are ignored when they send datagrams.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tokio::fs;

use crate::dispatch::DeviceRegistry;
use crate::protocol::Protocol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub udp: UdpConfig,
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UdpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_udp_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_udp_port() -> u16 {
    56000
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_bind_address(),
            port: default_udp_port(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Rtscts,
    Xon,
    Xoff,
    Xany,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_serial_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default)]
    pub flow_control: FlowControl,
    /// Idle time between bytes before a partial frame is dropped (ms).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    5000
}

impl SerialConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: Parity::None,
            stop_bits: default_stop_bits(),
            flow_control: FlowControl::None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Protocol binding for one terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub ip: String,
    pub protocol: Protocol,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load and validate configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config
            .validate()
            .map_err(|e| anyhow!("Invalid config file {}: {}", path, e))?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.udp.enabled {
            self.udp
                .bind_address
                .parse::<IpAddr>()
                .map_err(|e| anyhow!("udp.bind_address '{}': {}", self.udp.bind_address, e))?;
        }

        let s = &self.serial;
        if s.enabled && s.port.trim().is_empty() {
            bail!("serial.port must be set when serial is enabled");
        }
        if s.baud_rate == 0 {
            bail!("serial.baud_rate must be positive");
        }
        if !(5..=8).contains(&s.data_bits) {
            bail!("serial.data_bits must be 5-8, got {}", s.data_bits);
        }
        if !(1..=2).contains(&s.stop_bits) {
            bail!("serial.stop_bits must be 1 or 2, got {}", s.stop_bits);
        }
        if s.timeout_ms == 0 {
            bail!("serial.timeout_ms must be positive");
        }

        DeviceRegistry::from_config(&self.devices)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            udp: UdpConfig::default(),
            serial: SerialConfig::default(),
            devices: vec![DeviceConfig {
                ip: "192.168.1.50".to_string(),
                protocol: Protocol::Home,
            }],
            logging: LoggingConfig {
                level: default_log_level(),
                file: Some("ekey-gateway.log".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.udp.port, 56000);
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.idle_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_minimal_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [serial]
            enabled = true
            port = "/dev/ttyS1"
            flow_control = "rtscts"

            [[devices]]
            ip = "10.0.0.7"
            protocol = "RARE"
            "#,
        )
        .unwrap();
        assert!(config.udp.enabled);
        assert_eq!(config.serial.data_bits, 8);
        assert_eq!(config.serial.stop_bits, 1);
        assert_eq!(config.serial.parity, Parity::None);
        assert_eq!(config.serial.flow_control, FlowControl::Rtscts);
        assert_eq!(config.serial.timeout_ms, 5000);
        assert_eq!(config.devices[0].protocol, Protocol::Rare);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_device_ip() {
        let mut config = Config::default();
        config.devices.push(DeviceConfig {
            ip: "not-an-ip".to_string(),
            protocol: Protocol::Net,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_duplicate_device() {
        let mut config = Config::default();
        config.devices.push(DeviceConfig {
            ip: "192.168.1.50".to_string(),
            protocol: Protocol::Multi,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_bad_line_settings() {
        let mut config = Config::default();
        config.serial.data_bits = 9;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        assert!(serialized.contains("protocol = \"HOME\""));
        let back: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(back.devices.len(), 1);
        assert_eq!(back.logging.file.as_deref(), Some("ekey-gateway.log"));
    }

    #[test]
    fn test_logging_level_defaults_when_omitted() {
        let config: Config = toml::from_str("[logging]\nfile = \"gateway.log\"\n").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.file.as_deref(), Some("gateway.log"));
    }
}
