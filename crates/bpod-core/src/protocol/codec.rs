//! Byte-level encoding of requests and decoding of device responses.
//!
//! Every request is a one-byte opcode optionally followed by a payload.
//! Multi-byte fields are little-endian, matching the state machine firmware.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Buffer too small: expected {expected}, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
}

/// An encoded request: opcode plus payload, written to the port in one call.
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    buf: Vec<u8>,
}

impl Request {
    pub fn new(opcode: u8) -> Self {
        Self { buf: vec![opcode] }
    }

    pub fn opcode(&self) -> u8 {
        self.buf[0]
    }

    pub fn u8(mut self, value: u8) -> Self {
        self.buf.push(value);
        self
    }

    pub fn bytes(mut self, values: &[u8]) -> Self {
        self.buf.extend_from_slice(values);
        self
    }

    /// Booleans are sent as one byte each (0 or 1).
    pub fn bools(mut self, values: &[bool]) -> Self {
        self.buf.extend(values.iter().map(|&v| v as u8));
        self
    }

    pub fn u16_array(mut self, values: &[u16]) -> Self {
        for &v in values {
            // Writing into a Vec cannot fail
            let _ = self.buf.write_u16::<LittleEndian>(v);
        }
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        let _ = self.buf.write_u32::<LittleEndian>(value);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Request({} len={})",
            printable(self.opcode()),
            self.buf.len()
        )
    }
}

/// Render a protocol byte for logs, e.g. `'H' (0x48)`.
pub fn printable(byte: u8) -> String {
    if byte.is_ascii_graphic() {
        format!("'{}' (0x{:02X})", byte as char, byte)
    } else {
        format!("0x{:02X}", byte)
    }
}

/// Fixed-width field reads in device byte order.
///
/// Implementors supply `read_exact` and `short_read`; a response buffer and a
/// live connection decode identically.
pub trait WireRead {
    type Error;

    /// Read `len` bytes.
    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, Self::Error>;

    /// Error for a read that returned fewer bytes than requested.
    fn short_read(expected: usize, actual: usize) -> Self::Error;

    /// `read_exact`, rejecting short buffers instead of trusting the source.
    fn take(&mut self, len: usize) -> Result<Vec<u8>, Self::Error> {
        let bytes = self.read_exact(len)?;
        if bytes.len() < len {
            return Err(Self::short_read(len, bytes.len()));
        }
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, Self::Error> {
        let bytes = self.take(1)?;
        bytes.first().copied().ok_or_else(|| Self::short_read(1, 0))
    }

    fn u16(&mut self) -> Result<u16, Self::Error> {
        Ok(LittleEndian::read_u16(&self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32, Self::Error> {
        Ok(LittleEndian::read_u32(&self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64, Self::Error> {
        Ok(LittleEndian::read_u64(&self.take(8)?))
    }

    fn u8_array(&mut self, count: usize) -> Result<Vec<u8>, Self::Error> {
        self.take(count)
    }

    fn u16_array(&mut self, count: usize) -> Result<Vec<u16>, Self::Error> {
        let bytes = self.take(count * 2)?;
        let mut out = vec![0u16; count];
        LittleEndian::read_u16_into(&bytes, &mut out);
        Ok(out)
    }

    fn u32_array(&mut self, count: usize) -> Result<Vec<u32>, Self::Error> {
        let bytes = self.take(count * 4)?;
        let mut out = vec![0u32; count];
        LittleEndian::read_u32_into(&bytes, &mut out);
        Ok(out)
    }

    /// Single-character codes, one byte each.
    fn char_array(&mut self, count: usize) -> Result<Vec<char>, Self::Error> {
        Ok(self.take(count)?.into_iter().map(char::from).collect())
    }
}

/// Sequential reader over a response buffer.
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl WireRead for Decoder<'_> {
    type Error = CodecError;

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        let actual = self.remaining();
        if actual < len {
            return Err(CodecError::BufferTooSmall {
                expected: len,
                actual,
            });
        }
        let out = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(out)
    }

    fn short_read(expected: usize, actual: usize) -> CodecError {
        CodecError::BufferTooSmall { expected, actual }
    }
}
