//! Bpod-Core: serial wire protocol driver for Bpod behavior state machines.
//!
//! A Bpod state machine talks to the host over one USB serial port, or three
//! on multi-port hardware (primary, secondary and analog). This crate finds
//! those ports, negotiates the hardware description and exposes the command
//! and data-read vocabulary of the primary port.
//!
//! # Architecture
//!
//! - **Protocol**: opcodes, response codes, request encoding and field decoding
//! - **Transport**: serial port abstraction (serialport, mock)
//! - **Discovery**: beacon scan and role identification of multi-port devices
//! - **Hardware**: negotiated capabilities and channel tables
//! - **Driver**: handshakes, commands, timestamps and analog samples
//!
//! # Example
//!
//! ```no_run
//! use bpod_core::{BpodDriver, DriverConfig, SystemPorts};
//!
//! let config = DriverConfig {
//!     serial_port: Some("/dev/ttyACM0".to_string()),
//!     ..Default::default()
//! };
//!
//! let mut driver = BpodDriver::open(&SystemPorts, &config).expect("Bpod not found");
//! driver.enable_ports(&config.ports_enabled()).expect("enable ports failed");
//! ```

pub mod config;
pub mod discovery;
pub mod driver;
pub mod error;
pub mod hardware;
pub mod protocol;
pub mod slots;
pub mod transport;

// Re-exports for convenience
pub use config::DriverConfig;
pub use discovery::{DiscoveredPorts, DiscoveryOptions, identify_ports};
pub use driver::{
    AnalogFrame, AnalogReader, BpodDriver, ChannelCategory, Role, SerialChannel, TrialEnd,
};
pub use error::{BpodError, Result};
pub use hardware::{
    FlexChannelType, HardwareCapabilities, HardwareDescription, PortsEnabled, ThresholdMode,
};
pub use slots::MessageSlots;
pub use transport::{
    MockPortProvider, MockTransport, PortProvider, SerialPortTransport, SerialTransport,
    SystemPorts, TransportError,
};
