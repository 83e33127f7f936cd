//! Serial transport layer abstraction.
//!
//! Defines the `SerialTransport` trait for one open serial connection and
//! the `PortProvider` trait for enumerating and opening endpoints, allowing
//! different implementations (serialport, mock, etc.).

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Failed to open {port}: {message}")]
    OpenFailed { port: String, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// One open serial connection.
///
/// All calls block for at most the read timeout the connection was opened
/// with. The connection is closed when dropped.
pub trait SerialTransport: Send {
    /// Write all bytes.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Read exactly `len` bytes, or fail with `Timeout`.
    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError>;

    /// Number of bytes waiting in the input buffer.
    fn bytes_available(&mut self) -> Result<usize, TransportError>;

    /// Drop anything waiting in the input buffer.
    fn clear_input(&mut self) -> Result<(), TransportError>;

    /// Endpoint identifier this connection was opened on.
    fn name(&self) -> &str;
}

/// Enumerates candidate endpoints and opens connections to them.
pub trait PortProvider {
    fn list_ports(&self) -> Vec<String>;

    fn open(
        &self,
        port: &str,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>, TransportError>;
}
