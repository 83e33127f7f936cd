//! serialport-based transport implementation.

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, instrument, trace};

use super::traits::{PortProvider, SerialTransport, TransportError};

/// One open USB serial port.
pub struct SerialPortTransport {
    port: Box<dyn SerialPort>,
    name: String,
    timeout_ms: u64,
}

impl SerialPortTransport {
    /// Open `name` as 8N1 without flow control.
    #[instrument(level = "debug")]
    pub fn open(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(name, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(name.to_string()),
                _ => TransportError::OpenFailed {
                    port: name.to_string(),
                    message: e.to_string(),
                },
            })?;

        debug!(port = %name, "Port opened");
        Ok(Self {
            port,
            name: name.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        })
    }
}

impl SerialTransport for SerialPortTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port
            .write_all(data)
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        trace!(port = %self.name, len = data.len(), data = ?data, "TX");
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut buf = vec![0u8; len];
        match self.port.read_exact(&mut buf) {
            Ok(()) => {
                trace!(port = %self.name, len, data = ?buf, "RX");
                Ok(buf)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => Err(TransportError::Timeout {
                timeout_ms: self.timeout_ms,
            }),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(TransportError::Disconnected),
            Err(e) => Err(TransportError::ReadFailed(e.to_string())),
        }
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::ReadFailed(e.to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Ports of the host operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPorts;

impl PortProvider for SystemPorts {
    fn list_ports(&self) -> Vec<String> {
        let mut names: Vec<String> = serialport::available_ports()
            .unwrap_or_default()
            .into_iter()
            .map(|info| info.port_name)
            .collect();
        names.sort_by_key(|n| port_sort_key(n));
        names.dedup();
        names
    }

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>, TransportError> {
        Ok(Box::new(SerialPortTransport::open(port, baud_rate, timeout)?))
    }
}

/// ttyACM*, ttyUSB*, then COM*, each numerically; everything else by name.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        return (0, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        return (1, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("COM") {
        return (2, rest.parse().unwrap_or(usize::MAX), basename.to_string());
    }
    (3, 0, basename.to_string())
}
