//! Mock serial transport for testing.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{PortProvider, SerialTransport, TransportError};

const MOCK_TIMEOUT_MS: u64 = 1000;

/// Writing `trigger` on the owning port queues `response` on `target`.
struct Link {
    trigger: u8,
    target: MockTransport,
    response: Vec<u8>,
}

#[derive(Default)]
struct PortState {
    /// Bytes the "device" has sent and the host has not read yet.
    rx: VecDeque<u8>,
    /// Captured writes.
    write_log: Vec<Vec<u8>>,
    links: Vec<Link>,
    disconnected: bool,
    fail_reads: bool,
    short_reads: bool,
    open_handles: usize,
    opens: usize,
    closes: usize,
}

/// Mock port for unit testing protocol logic.
///
/// Clones share the same simulated port. Handles returned by
/// [`MockPortProvider::open`] count as open connections until dropped.
pub struct MockTransport {
    name: String,
    state: Arc<Mutex<PortState>>,
    counted: bool,
}

impl MockTransport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(PortState::default())),
            counted: false,
        }
    }

    /// A handle that is tracked as one open connection until dropped.
    pub fn open_handle(&self) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.open_handles += 1;
            state.opens += 1;
        }
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            counted: true,
        }
    }

    /// Queue raw bytes to be returned on subsequent reads.
    pub fn queue_bytes(&self, bytes: &[u8]) {
        self.state.lock().unwrap().rx.extend(bytes.iter().copied());
    }

    pub fn queue_u8(&self, value: u8) {
        self.queue_bytes(&[value]);
    }

    pub fn queue_u16(&self, value: u16) {
        self.queue_bytes(&value.to_le_bytes());
    }

    pub fn queue_u32(&self, value: u32) {
        self.queue_bytes(&value.to_le_bytes());
    }

    pub fn queue_u64(&self, value: u64) {
        self.queue_bytes(&value.to_le_bytes());
    }

    /// When `trigger` is written to this port, queue `response` on `target`.
    ///
    /// Every written byte is matched, payload bytes included.
    pub fn respond_on(&self, trigger: u8, target: &MockTransport, response: &[u8]) {
        self.state.lock().unwrap().links.push(Link {
            trigger,
            target: target.clone(),
            response: response.to_vec(),
        });
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().write_log.clone()
    }

    /// All captured writes, concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.get_writes().concat()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.state.lock().unwrap().write_log.clear();
    }

    /// Bytes queued but not yet read.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().rx.len()
    }

    /// Make every subsequent read fail with a non-timeout error.
    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    /// Make every subsequent read return one byte fewer than requested.
    pub fn short_reads(&self) {
        self.state.lock().unwrap().short_reads = true;
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open_handles > 0
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            state: Arc::clone(&self.state),
            counted: false,
        }
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        if self.counted {
            let mut state = self.state.lock().unwrap();
            state.open_handles -= 1;
            state.closes += 1;
        }
    }
}

impl SerialTransport for MockTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let responses: Vec<(MockTransport, Vec<u8>)> = {
            let mut state = self.state.lock().unwrap();
            if state.disconnected {
                return Err(TransportError::Disconnected);
            }
            state.write_log.push(data.to_vec());
            let mut responses = Vec::new();
            for &byte in data {
                for link in state.links.iter().filter(|l| l.trigger == byte) {
                    responses.push((link.target.clone(), link.response.clone()));
                }
            }
            responses
        };
        for (target, response) in responses {
            target.queue_bytes(&response);
        }
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(TransportError::Disconnected);
        }
        if state.fail_reads {
            return Err(TransportError::ReadFailed(format!("{}: I/O error", self.name)));
        }
        let len = if state.short_reads {
            len.saturating_sub(1)
        } else {
            len
        };
        if state.rx.len() < len {
            return Err(TransportError::Timeout {
                timeout_ms: MOCK_TIMEOUT_MS,
            });
        }
        Ok(state.rx.drain(..len).collect())
    }

    fn bytes_available(&mut self) -> Result<usize, TransportError> {
        Ok(self.state.lock().unwrap().rx.len())
    }

    fn clear_input(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().rx.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Mock set of host serial ports.
#[derive(Default)]
pub struct MockPortProvider {
    ports: Mutex<Vec<MockTransport>>,
    failing: Mutex<HashSet<String>>,
    open_log: Mutex<Vec<String>>,
}

impl MockPortProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a port and return a handle for scripting it.
    pub fn add_port(&self, name: &str) -> MockTransport {
        let port = MockTransport::new(name);
        self.ports.lock().unwrap().push(port.clone());
        port
    }

    /// Register a port that is listed but cannot be opened.
    pub fn add_failing_port(&self, name: &str) {
        self.ports.lock().unwrap().push(MockTransport::new(name));
        self.failing.lock().unwrap().insert(name.to_string());
    }

    /// Every open attempt, in order, including failed ones.
    pub fn open_attempts(&self) -> Vec<String> {
        self.open_log.lock().unwrap().clone()
    }
}

impl PortProvider for MockPortProvider {
    fn list_ports(&self) -> Vec<String> {
        self.ports
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        _timeout: Duration,
    ) -> Result<Box<dyn SerialTransport>, TransportError> {
        self.open_log.lock().unwrap().push(port.to_string());
        if self.failing.lock().unwrap().contains(port) {
            return Err(TransportError::OpenFailed {
                port: port.to_string(),
                message: "Permission denied".into(),
            });
        }
        let ports = self.ports.lock().unwrap();
        let found = ports
            .iter()
            .find(|p| p.name == port)
            .ok_or_else(|| TransportError::PortNotFound(port.to_string()))?;
        Ok(Box::new(found.open_handle()))
    }
}
