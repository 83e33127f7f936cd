//! Transport layer module.

pub mod mock;
pub mod serial;
pub mod traits;

pub use mock::{MockPortProvider, MockTransport};
pub use serial::{SerialPortTransport, SystemPorts};
pub use traits::{PortProvider, SerialTransport, TransportError};
