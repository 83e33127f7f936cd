//! Driver configuration.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::hardware::PortsEnabled;
use crate::protocol::constants::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS, NO_SYNC_CHANNEL};

/// Connection settings and the input enablement applied after negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Primary serial port. Ports are identified automatically when unset.
    pub serial_port: Option<String>,
    pub baud_rate: u32,
    /// Read timeout of the role connections.
    pub timeout_ms: u64,
    /// Read timeout while identifying ports.
    pub probe_timeout_ms: u64,
    /// Sync output channel; 255 disables it.
    pub sync_channel: u8,
    pub sync_mode: u8,
    pub bnc_ports_enabled: Vec<bool>,
    pub wired_ports_enabled: Vec<bool>,
    pub behavior_ports_enabled: Vec<bool>,
    pub flex_ports_enabled: Vec<bool>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            serial_port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_TIMEOUT_MS,
            sync_channel: NO_SYNC_CHANNEL,
            sync_mode: 1,
            bnc_ports_enabled: Vec::new(),
            wired_ports_enabled: Vec::new(),
            behavior_ports_enabled: Vec::new(),
            flex_ports_enabled: Vec::new(),
        }
    }
}

impl DriverConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DriverConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn ports_enabled(&self) -> PortsEnabled {
        PortsEnabled {
            bnc: self.bnc_ports_enabled.clone(),
            wired: self.wired_ports_enabled.clone(),
            behavior: self.behavior_ports_enabled.clone(),
            flex: self.flex_ports_enabled.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.timeout(), Duration::from_secs(1));
        assert_eq!(config.sync_channel, 255);
        assert_eq!(config.ports_enabled(), PortsEnabled::default());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: DriverConfig = toml::from_str(
            r#"
            serial_port = "/dev/ttyACM0"
            behavior_ports_enabled = [true, false, true]
            "#,
        )
        .unwrap();

        assert_eq!(config.serial_port.as_deref(), Some("/dev/ttyACM0"));
        assert_eq!(config.baud_rate, DEFAULT_BAUD_RATE);
        assert_eq!(config.ports_enabled().behavior, vec![true, false, true]);
        assert!(config.ports_enabled().bnc.is_empty());
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("bpod-config-{}.toml", std::process::id()));
        let config = DriverConfig {
            serial_port: Some("COM3".into()),
            probe_timeout_ms: 250,
            flex_ports_enabled: vec![true; 4],
            ..Default::default()
        };

        config.save_to_file(&path).unwrap();
        let loaded = DriverConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.probe_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file() {
        assert!(DriverConfig::load_from_file("/nonexistent/bpod.toml").is_err());
    }
}
