//! Bpod driver - owns the role connections and the negotiated device state.
//!
//! This module is split by concern:
//! - `connection`: role-indexed connections and acknowledgment reads
//! - `handshake`: connectivity checks and capability negotiation
//! - `commands`: request/response operations on the primary port
//! - `timestamps`: trial timestamps, event reads and analog samples

mod commands;
pub mod connection;
mod handshake;
pub mod timestamps;

use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::config::DriverConfig;
use crate::discovery::{DiscoveredPorts, DiscoveryOptions, identify_ports};
use crate::error::{BpodError, Result};
use crate::hardware::HardwareCapabilities;
use crate::protocol::constants::DEFAULT_SERIAL_MESSAGE_MAX_BYTES;
use crate::slots::MessageSlots;
use crate::transport::{PortProvider, SerialTransport};

pub use commands::{ChannelCategory, SerialChannel};
pub use connection::{Connection, Connections, Role};
pub use timestamps::{AnalogFrame, AnalogReader, TimestampState, TrialEnd};

/// Communication driver for one state machine.
pub struct BpodDriver {
    connections: Connections,
    firmware: Option<(u16, u16)>,
    hardware: Option<HardwareCapabilities>,
    message_slots: MessageSlots,
    timestamps: TimestampState,
}

impl BpodDriver {
    /// Driver over already-open connections.
    pub fn from_connections(
        primary: Box<dyn SerialTransport>,
        secondary: Option<Box<dyn SerialTransport>>,
        analog: Option<Box<dyn SerialTransport>>,
    ) -> Self {
        let mut connections = Connections::new();
        connections.insert(Role::Primary, primary);
        if let Some(conn) = secondary {
            connections.insert(Role::Secondary, conn);
        }
        if let Some(conn) = analog {
            connections.insert(Role::Analog, conn);
        }
        Self {
            connections,
            firmware: None,
            hardware: None,
            message_slots: MessageSlots::new(),
            timestamps: TimestampState::default(),
        }
    }

    /// Open the role connections for `ports` without talking to the device.
    pub fn connect<P: PortProvider + ?Sized>(
        provider: &P,
        ports: &DiscoveredPorts,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let primary_port = ports.primary.as_deref().ok_or(BpodError::NoPrimaryPort)?;
        info!(port = %primary_port, "Connecting");
        let mut primary = provider.open(primary_port, baud_rate, timeout)?;
        // Drop beacon bytes sent before the handshake
        primary.clear_input()?;

        let open_optional = |port: &Option<String>, role: Role| -> Result<_> {
            match port {
                Some(name) => {
                    info!(port = %name, role = %role, "Connecting");
                    let mut conn = provider.open(name, baud_rate, timeout)?;
                    // Identification may have left handshake replies queued
                    conn.clear_input()?;
                    Ok(Some(conn))
                }
                None => Ok(None),
            }
        };
        let secondary = open_optional(&ports.secondary, Role::Secondary)?;
        let analog = open_optional(&ports.analog, Role::Analog)?;

        Ok(Self::from_connections(primary, secondary, analog))
    }

    /// Resolve ports, connect, handshake and negotiate capabilities.
    ///
    /// A configured serial port is used as the primary port as-is; without
    /// one, the ports are identified automatically.
    #[instrument(skip_all)]
    pub fn open<P: PortProvider + ?Sized>(provider: &P, config: &DriverConfig) -> Result<Self> {
        let ports = match &config.serial_port {
            Some(port) => DiscoveredPorts {
                primary: Some(port.clone()),
                ..Default::default()
            },
            None => {
                info!("No serial port provided. Searching ports...");
                let options = DiscoveryOptions {
                    primary: None,
                    baud_rate: config.baud_rate,
                    probe_timeout: config.probe_timeout(),
                };
                identify_ports(provider, &options)
            }
        };

        let mut driver = Self::connect(provider, &ports, config.baud_rate, config.timeout())?;
        if !driver.handshake()? {
            return Err(BpodError::HandshakeFailed(Role::Primary));
        }
        if driver.is_connected(Role::Secondary) && !driver.handshake_secondary()? {
            warn!("Secondary port did not answer its handshake");
        }
        if driver.is_connected(Role::Analog) && !driver.handshake_analog()? {
            warn!("Analog port did not answer its handshake");
        }
        driver.negotiate()?;
        Ok(driver)
    }

    /// Close every open connection. Safe to call more than once.
    pub fn close(&mut self) {
        self.connections.close_all();
    }

    pub fn is_connected(&self, role: Role) -> bool {
        self.connections.is_connected(role)
    }

    pub fn port_name(&self, role: Role) -> Option<&str> {
        self.connections.port_name(role)
    }

    /// Negotiated capabilities, if the hardware description has been read.
    pub fn hardware(&self) -> Option<&HardwareCapabilities> {
        self.hardware.as_ref()
    }

    fn hardware_required(&self) -> Result<&HardwareCapabilities> {
        self.hardware.as_ref().ok_or(BpodError::HardwareNotNegotiated)
    }

    /// Serial messages loaded this session.
    pub fn message_slots(&self) -> &MessageSlots {
        &self.message_slots
    }

    /// Forget which serial messages were loaded.
    pub fn clear_message_slots(&mut self) {
        self.message_slots.clear();
    }

    /// Negotiated serial message size limit, or the pre-v23 default.
    pub fn serial_message_max_bytes(&self) -> u8 {
        self.hardware
            .as_ref()
            .map(|hw| hw.serial_message_max_bytes)
            .unwrap_or(DEFAULT_SERIAL_MESSAGE_MAX_BYTES)
    }

    pub fn timestamps(&self) -> &TimestampState {
        &self.timestamps
    }
}

impl Drop for BpodDriver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::protocol::constants::*;
    use crate::transport::{MockPortProvider, MockTransport};

    /// Firmware version response body.
    pub(crate) fn queue_firmware(port: &MockTransport, firmware_version: u16, machine_type: u16) {
        port.queue_u16(firmware_version);
        port.queue_u16(machine_type);
    }

    /// Hardware description body: 100us cycle, 5-byte serial messages from v23.
    pub(crate) fn hardware_bytes(firmware_version: u16, inputs: &[u8], outputs: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&256u16.to_le_bytes());
        bytes.extend_from_slice(&100u16.to_le_bytes());
        bytes.push(60);
        if firmware_version > SERIAL_MESSAGE_MAX_BYTES_MIN_FIRMWARE {
            bytes.push(5);
        }
        bytes.extend_from_slice(&[16, 8, 16]);
        bytes.push(inputs.len() as u8);
        bytes.extend_from_slice(inputs);
        bytes.push(outputs.len() as u8);
        bytes.extend_from_slice(outputs);
        bytes
    }

    pub(crate) fn queue_hardware(
        port: &MockTransport,
        firmware_version: u16,
        inputs: &[u8],
        outputs: &[u8],
    ) {
        port.queue_bytes(&hardware_bytes(firmware_version, inputs, outputs));
    }

    /// Driver negotiated against firmware v23 with the given channel layout.
    pub(crate) fn driver_with_hardware(inputs: &[u8], outputs: &[u8]) -> (BpodDriver, MockTransport) {
        let port = MockTransport::new("ttyACM0");
        let mut driver = BpodDriver::from_connections(Box::new(port.clone()), None, None);
        queue_firmware(&port, 23, 3);
        queue_hardware(&port, 23, inputs, outputs);
        port.queue_u8(1);
        driver.negotiate().unwrap();
        port.clear_writes();
        (driver, port)
    }

    /// Answer the handshake and negotiation opcodes on `port` itself.
    fn script_device(port: &MockTransport, firmware_version: u16) {
        port.respond_on(OP_HANDSHAKE, port, &[RSP_HANDSHAKE_OK]);
        let mut firmware = firmware_version.to_le_bytes().to_vec();
        firmware.extend_from_slice(&4u16.to_le_bytes());
        port.respond_on(OP_FIRMWARE_VERSION, port, &firmware);
        port.respond_on(
            OP_HARDWARE_DESCRIPTION,
            port,
            &hardware_bytes(firmware_version, b"UUFFBWPP", b"UUFFBWVVPP"),
        );
        port.respond_on(OP_GET_TIMESTAMP_TRANSMISSION, port, &[1]);
    }

    #[test]
    fn test_connect_without_primary() {
        let provider = MockPortProvider::new();
        let result = BpodDriver::connect(
            &provider,
            &DiscoveredPorts::default(),
            DEFAULT_BAUD_RATE,
            Duration::from_millis(10),
        );
        assert!(matches!(result, Err(BpodError::NoPrimaryPort)));
        assert!(provider.open_attempts().is_empty());
    }

    #[test]
    fn test_open_configured_port() {
        let provider = MockPortProvider::new();
        let port = provider.add_port("ttyACM0");
        // Stale beacon bytes
        port.queue_bytes(&[PRIMARY_PORT_BEACON, PRIMARY_PORT_BEACON]);
        script_device(&port, 23);

        let config = DriverConfig {
            serial_port: Some("ttyACM0".into()),
            ..Default::default()
        };
        let driver = BpodDriver::open(&provider, &config).unwrap();

        let hw = driver.hardware().unwrap();
        assert_eq!(hw.firmware_version, 23);
        assert_eq!(hw.machine_type, 4);
        assert_eq!(hw.serial_message_max_bytes, 5);
        assert_eq!(hw.n_uart_channels, 2);
        assert_eq!(hw.n_flex_channels, 2);
        assert_eq!(driver.port_name(Role::Primary), Some("ttyACM0"));
        assert!(!driver.is_connected(Role::Secondary));
        assert_eq!(provider.open_attempts(), vec!["ttyACM0"]);
    }

    #[test]
    fn test_open_fails_without_handshake() {
        let provider = MockPortProvider::new();
        let port = provider.add_port("ttyACM0");
        let config = DriverConfig {
            serial_port: Some("ttyACM0".into()),
            ..Default::default()
        };

        assert!(matches!(
            BpodDriver::open(&provider, &config),
            Err(BpodError::HandshakeFailed(Role::Primary))
        ));
        // Connection closed on the way out
        assert!(!port.is_open());
    }

    #[test]
    fn test_close_is_idempotent() {
        let port = MockTransport::new("ttyACM0");
        let analog = MockTransport::new("ttyACM2");
        let mut driver = BpodDriver::from_connections(
            Box::new(port.open_handle()),
            None,
            Some(Box::new(analog.open_handle())),
        );

        driver.close();
        driver.close();
        drop(driver);
        assert_eq!(port.close_count(), 1);
        assert_eq!(analog.close_count(), 1);
    }
}
