//! Protocol module - opcode/response vocabulary and wire codec.

pub mod codec;
pub mod constants;

pub use codec::{CodecError, Decoder, Request, WireRead, printable};
pub use constants::*;
