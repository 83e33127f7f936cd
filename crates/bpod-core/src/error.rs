//! Driver errors.

use thiserror::Error;

use crate::driver::Role;
use crate::protocol::CodecError;
use crate::transport::TransportError;

/// Errors surfaced by driver operations.
///
/// A response code that does not match the expected acknowledgment is not an
/// error; commands report it as `Ok(false)`.
#[derive(Error, Debug)]
pub enum BpodError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed response: {0}")]
    Codec(#[from] CodecError),

    #[error("Error using manual_override: {name} is not a valid channel name")]
    InvalidChannel { name: String },

    #[error("Error using manual_override: channel category must be input or output")]
    InvalidChannelCategory,

    #[error("Serial messages cannot be more than {max_bytes} bytes in length (got {len})")]
    MessageTooLong { len: usize, max_bytes: u8 },

    #[error("Only 255 serial messages can be stored (indexed 1-255); got message id {id}")]
    InvalidMessageId { id: u32 },

    #[error("{0} port is not connected")]
    RoleNotConnected(Role),

    #[error("Handshake failed on {0} port")]
    HandshakeFailed(Role),

    #[error("No primary serial port configured or discovered")]
    NoPrimaryPort,

    #[error("Hardware description has not been read yet")]
    HardwareNotNegotiated,

    #[error("Unknown flex channel type code {0}")]
    UnknownFlexChannelType(u8),

    #[error("Expected {expected} values, got {actual}")]
    InvalidChannelCount { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, BpodError>;
