// src/settings.rs
//
// Reader configuration.
// `ReaderSettings` mirrors the TOML file; `ConnectionConfig` is the validated,
// immutable view handed to the acquisition worker.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::AcquisitionError;
use crate::io::serial::utils::to_serialport_data_bits;
use crate::protocol::ReadMode;

/// Port name that asks the resolver to pick a device
pub const AUTO_PORT: &str = "auto";

/// Payload injected by simulation mode when none is configured
pub const DEFAULT_SIMULATION_PAYLOAD: &str = "CCFFFF10320D01E2000016370402410910C2E9AC";

// ============================================================================
// File model
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ReaderSettings {
    #[serde(default)]
    pub reader: ConnectionSettings,
    #[serde(default)]
    pub protocol: ProtocolSettings,
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionSettings {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_connection_retries")]
    pub connection_retries: u32,
    /// Pause between reopen attempts. Not the per-byte transport timeout.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
    #[serde(default = "default_auto_read")]
    pub auto_read: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProtocolSettings {
    #[serde(default = "default_protocol_model")]
    pub model: String, // "kingjoin" | "fixed"
    /// Display name for "fixed" models
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub frame_length: Option<usize>,
    #[serde(default)]
    pub read_mode: ReadMode,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimulationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_simulation_payload")]
    pub payload: String,
    #[serde(default = "default_simulation_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LoggingSettings {
    /// Directory for log files. File logging is off when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
}

fn default_port() -> String {
    AUTO_PORT.to_string()
}
fn default_baud_rate() -> u32 {
    57600
}
fn default_data_bits() -> u8 {
    8
}
fn default_connection_retries() -> u32 {
    3
}
fn default_connection_timeout_ms() -> u64 {
    5000
}
fn default_auto_read() -> bool {
    true
}
fn default_protocol_model() -> String {
    "kingjoin".to_string()
}
fn default_simulation_payload() -> String {
    DEFAULT_SIMULATION_PAYLOAD.to_string()
}
fn default_simulation_interval_ms() -> u64 {
    5000
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            connection_retries: default_connection_retries(),
            connection_timeout_ms: default_connection_timeout_ms(),
            auto_read: default_auto_read(),
        }
    }
}

impl Default for ProtocolSettings {
    fn default() -> Self {
        Self {
            model: default_protocol_model(),
            name: None,
            frame_length: None,
            read_mode: ReadMode::default(),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            payload: default_simulation_payload(),
            interval_ms: default_simulation_interval_ms(),
        }
    }
}

impl SimulationSettings {
    pub fn payload_bytes(&self) -> Result<Vec<u8>, String> {
        let bytes = hex::decode(self.payload.trim())
            .map_err(|e| format!("Invalid simulation payload: {}", e))?;
        if bytes.is_empty() {
            return Err("Simulation payload is empty".to_string());
        }
        Ok(bytes)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl ReaderSettings {
    pub fn connection_config(&self) -> Result<ConnectionConfig, AcquisitionError> {
        let r = &self.reader;
        ConnectionConfig::new(
            r.port.clone(),
            r.baud_rate,
            r.data_bits,
            r.connection_retries,
            Duration::from_millis(r.connection_timeout_ms),
            r.auto_read,
        )
    }
}

// ============================================================================
// Validated connection config
// ============================================================================

/// Connection parameters, fixed for the lifetime of the process.
///
/// `max_timeout` is the pause between reopen attempts. The per-byte read and
/// write timeout of an open port is fixed separately by the connection builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    port_name: String,
    baud_rate: u32,
    data_bits: u8,
    max_retry: u32,
    max_timeout: Duration,
    auto_read: bool,
}

impl ConnectionConfig {
    pub fn new(
        port_name: impl Into<String>,
        baud_rate: u32,
        data_bits: u8,
        max_retry: u32,
        max_timeout: Duration,
        auto_read: bool,
    ) -> Result<Self, AcquisitionError> {
        if baud_rate == 0 {
            return Err(AcquisitionError::InvalidConfig(
                "baud rate must be a positive integer".to_string(),
            ));
        }
        to_serialport_data_bits(data_bits).map_err(AcquisitionError::InvalidConfig)?;

        Ok(Self {
            port_name: port_name.into(),
            baud_rate,
            data_bits,
            max_retry,
            max_timeout,
            auto_read,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// True when the port should be picked by the resolver.
    /// "null" and an empty name are accepted as older spellings of "auto".
    pub fn is_auto_port(&self) -> bool {
        is_auto_port_name(&self.port_name)
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn data_bits(&self) -> u8 {
        self.data_bits
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry
    }

    pub fn max_timeout(&self) -> Duration {
        self.max_timeout
    }

    pub fn auto_read(&self) -> bool {
        self.auto_read
    }

    pub fn with_port_name(mut self, port_name: impl Into<String>) -> Self {
        self.port_name = port_name.into();
        self
    }
}

pub fn is_auto_port_name(name: &str) -> bool {
    let name = name.trim();
    name.is_empty() || name.eq_ignore_ascii_case(AUTO_PORT) || name.eq_ignore_ascii_case("null")
}

// ============================================================================
// Loading
// ============================================================================

/// Default config location: `<config dir>/proton-frequency/reader.toml`
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("proton-frequency")
        .join("reader.toml")
}

/// Load settings from a TOML file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<ReaderSettings, String> {
    if !path.exists() {
        return Ok(ReaderSettings::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read settings {}: {}", path.display(), e))?;
    parse_settings(&content)
}

pub fn parse_settings(content: &str) -> Result<ReaderSettings, String> {
    toml::from_str(content).map_err(|e| format!("Failed to parse settings: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings.reader.port, "auto");
        assert_eq!(settings.reader.baud_rate, 57600);
        assert_eq!(settings.reader.data_bits, 8);
        assert_eq!(settings.reader.connection_retries, 3);
        assert!(settings.reader.auto_read);
        assert_eq!(settings.protocol.model, "kingjoin");
        assert!(!settings.simulation.enabled);
        assert!(settings.logging.dir.is_none());
    }

    #[test]
    fn test_parse_full_file() {
        let content = r#"
            [reader]
            port = "/dev/ttyUSB0"
            baud_rate = 115200
            data_bits = 7
            connection_retries = 5
            connection_timeout_ms = 250
            auto_read = false

            [protocol]
            model = "fixed"
            frame_length = 16
            read_mode = "negotiated"

            [simulation]
            enabled = true
            payload = "0102"
            interval_ms = 100
        "#;
        let settings = parse_settings(content).unwrap();
        let config = settings.connection_config().unwrap();
        assert_eq!(config.port_name(), "/dev/ttyUSB0");
        assert_eq!(config.baud_rate(), 115200);
        assert_eq!(config.data_bits(), 7);
        assert_eq!(config.max_retry(), 5);
        assert_eq!(config.max_timeout(), Duration::from_millis(250));
        assert!(!config.auto_read());
        assert_eq!(settings.protocol.read_mode, ReadMode::Negotiated);
        assert_eq!(settings.simulation.payload_bytes().unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let zero_baud = ConnectionConfig::new("auto", 0, 8, 3, Duration::ZERO, true);
        assert!(matches!(zero_baud, Err(AcquisitionError::InvalidConfig(_))));

        let bad_bits = ConnectionConfig::new("auto", 9600, 9, 3, Duration::ZERO, true);
        assert!(matches!(bad_bits, Err(AcquisitionError::InvalidConfig(_))));
    }

    #[test]
    fn test_negative_values_rejected_by_parser() {
        assert!(parse_settings("[reader]\nbaud_rate = -1\n").is_err());
    }

    #[test]
    fn test_auto_port_aliases() {
        assert!(is_auto_port_name("auto"));
        assert!(is_auto_port_name("AUTO"));
        assert!(is_auto_port_name("null"));
        assert!(is_auto_port_name(""));
        assert!(!is_auto_port_name("/dev/ttyS0"));
    }

    #[test]
    fn test_default_simulation_payload_decodes() {
        let bytes = SimulationSettings::default().payload_bytes().unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(bytes[0], 0xCC);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("proton-frequency-does-not-exist.toml");
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.reader.port, AUTO_PORT);
    }
}
