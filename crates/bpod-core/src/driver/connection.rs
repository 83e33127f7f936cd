//! Role-indexed serial connections.

use std::fmt;

use tracing::{debug, trace, warn};

use crate::error::{BpodError, Result};
use crate::protocol::{Request, WireRead, printable};
use crate::transport::{SerialTransport, TransportError};

/// Logical function of a serial endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Commands, events and timestamps. Present on every device.
    Primary,
    /// Second application channel (multi-port hardware only).
    Secondary,
    /// Analog input samples (multi-port hardware only).
    Analog,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Primary, Role::Secondary, Role::Analog];

    fn index(self) -> usize {
        match self {
            Role::Primary => 0,
            Role::Secondary => 1,
            Role::Analog => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Primary => write!(f, "Primary"),
            Role::Secondary => write!(f, "Secondary"),
            Role::Analog => write!(f, "Analog"),
        }
    }
}

/// One open connection bound to a role.
pub struct Connection {
    role: Role,
    transport: Box<dyn SerialTransport>,
}

impl Connection {
    pub fn new(role: Role, transport: Box<dyn SerialTransport>) -> Self {
        Self { role, transport }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn port_name(&self) -> &str {
        self.transport.name()
    }

    pub fn send(&mut self, request: &Request) -> Result<()> {
        trace!(role = %self.role, request = ?request, "Sending request");
        self.transport.write(request.as_bytes())?;
        Ok(())
    }

    /// Write bytes that are not framed by this crate (e.g. a compiled state machine).
    pub fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        trace!(role = %self.role, len = data.len(), "Sending raw buffer");
        self.transport.write(data)?;
        Ok(())
    }

    /// Read one response byte and compare it with `expected`.
    ///
    /// A different byte or a read timeout is a negative result, not an error.
    pub fn expect_ok(&mut self, opcode: u8, expected: u8) -> Result<bool> {
        match self.transport.read(1) {
            Ok(bytes) => {
                let Some(&actual) = bytes.first() else {
                    return Err(short_response(1, 0));
                };
                let ok = actual == expected;
                if ok {
                    debug!(role = %self.role, opcode = %printable(opcode), "Acknowledged");
                } else {
                    warn!(
                        role = %self.role,
                        opcode = %printable(opcode),
                        expected = %printable(expected),
                        actual = %printable(actual),
                        "Unexpected response"
                    );
                }
                Ok(ok)
            }
            Err(TransportError::Timeout { timeout_ms }) => {
                warn!(role = %self.role, opcode = %printable(opcode), timeout_ms, "No response");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn bytes_available(&mut self) -> Result<usize> {
        Ok(self.transport.bytes_available()?)
    }

    pub fn clear_input(&mut self) -> Result<()> {
        Ok(self.transport.clear_input()?)
    }
}

impl WireRead for Connection {
    type Error = BpodError;

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
        Ok(self.transport.read(len)?)
    }

    fn short_read(expected: usize, actual: usize) -> BpodError {
        short_response(expected, actual)
    }
}

fn short_response(expected: usize, actual: usize) -> BpodError {
    TransportError::ReadFailed(format!(
        "Short response: expected {expected} bytes, got {actual}"
    ))
    .into()
}

/// At most one connection per role; dropping a connection closes it.
#[derive(Default)]
pub struct Connections {
    slots: [Option<Connection>; 3],
}

impl Connections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, role: Role, transport: Box<dyn SerialTransport>) {
        if let Some(old) = self.slots[role.index()].replace(Connection::new(role, transport)) {
            debug!(role = %role, port = %old.port_name(), "Replacing connection");
        }
    }

    pub fn get(&mut self, role: Role) -> Result<&mut Connection> {
        self.slots[role.index()]
            .as_mut()
            .ok_or(BpodError::RoleNotConnected(role))
    }

    pub fn is_connected(&self, role: Role) -> bool {
        self.slots[role.index()].is_some()
    }

    pub fn port_name(&self, role: Role) -> Option<&str> {
        self.slots[role.index()].as_ref().map(|c| c.port_name())
    }

    /// Write on `from`, then read the acknowledgment on `reply_on`.
    ///
    /// Exclusive access to both connections for the whole exchange keeps
    /// unrelated traffic from interleaving.
    pub fn exchange(
        &mut self,
        request: &Request,
        from: Role,
        reply_on: Role,
        expected: u8,
    ) -> Result<bool> {
        if !self.is_connected(reply_on) {
            return Err(BpodError::RoleNotConnected(reply_on));
        }
        self.get(from)?.send(request)?;
        self.get(reply_on)?.expect_ok(request.opcode(), expected)
    }

    /// Remove `role`'s connection and hand it to the caller.
    pub fn take(&mut self, role: Role) -> Option<Connection> {
        self.slots[role.index()].take()
    }

    /// Close `role`'s connection if open. Returns whether one was closed.
    pub fn close(&mut self, role: Role) -> bool {
        match self.slots[role.index()].take() {
            Some(conn) => {
                debug!(role = %role, port = %conn.port_name(), "Closing connection");
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for role in Role::ALL {
            self.close(role);
        }
    }
}
