//! Serial port identification for multi-port state machines.
//!
//! Devices with three USB serial ports (machine type 4) do not say which port
//! is which. The primary port emits a beacon byte every 100ms; once it is
//! known, the secondary and analog ports are found by sending their handshake
//! opcodes on the primary port and listening on each remaining candidate.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::protocol::constants::*;
use crate::transport::{PortProvider, SerialTransport, TransportError};

/// Ports resolved by one discovery pass. Any subset may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredPorts {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub analog: Option<String>,
}

impl DiscoveredPorts {
    pub fn is_complete(&self) -> bool {
        self.primary.is_some() && self.secondary.is_some() && self.analog.is_some()
    }
}

/// Parameters of one discovery pass.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Primary port known in advance; skips the beacon scan.
    pub primary: Option<String>,
    pub baud_rate: u32,
    /// Read timeout of each probe connection.
    pub probe_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            primary: None,
            baud_rate: DEFAULT_BAUD_RATE,
            probe_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

enum Probe<T> {
    Match(T),
    NoMatch,
}

/// Which side of a role probe failed.
enum ProbeFault {
    /// The identification connection to the primary port.
    Primary(TransportError),
    /// The candidate port under test.
    Candidate(TransportError),
}

/// Identify primary, secondary and analog ports among the provider's ports.
///
/// Ports that fail to open or read are excluded for the rest of the pass and
/// never abort it. If several ports emit the beacon, the first one listed wins.
#[instrument(skip(provider))]
pub fn identify_ports<P: PortProvider + ?Sized>(
    provider: &P,
    options: &DiscoveryOptions,
) -> DiscoveredPorts {
    let mut candidates = provider.list_ports();
    debug!(ports = ?candidates, "Available serial ports");

    let mut found = DiscoveredPorts::default();
    let mut bad_ports: HashSet<String> = HashSet::new();

    let primary = match &options.primary {
        Some(port) => Some(port.clone()),
        None => find_primary(provider, options, &candidates, &mut bad_ports),
    };
    let Some(primary) = primary else {
        info!("No primary port found");
        return found;
    };
    info!(port = %primary, "Primary port");

    candidates.retain(|p| *p != primary && !bad_ports.contains(p));
    found.primary = Some(primary.clone());

    let mut primary_conn =
        match provider.open(&primary, options.baud_rate, options.probe_timeout) {
            Ok(conn) => conn,
            Err(e) => {
                warn!(port = %primary, error = %e, "Cannot open primary port for identification");
                return found;
            }
        };

    for port in candidates {
        if found.secondary.is_some() && found.analog.is_some() {
            break;
        }
        debug!(port = %port, "Testing secondary and analog ports");
        match probe_role(provider, options, primary_conn.as_mut(), &port) {
            Ok(Probe::Match(RSP_SECONDARY_PORT_HANDSHAKE_OK)) if found.secondary.is_none() => {
                info!(port = %port, "Secondary port");
                found.secondary = Some(port);
            }
            Ok(Probe::Match(RSP_ANALOG_PORT_HANDSHAKE_OK)) if found.analog.is_none() => {
                info!(port = %port, "Analog port");
                found.analog = Some(port);
            }
            Ok(_) => debug!(port = %port, "Nothing received"),
            Err(ProbeFault::Candidate(e)) => {
                warn!(port = %port, error = %e, "Bad port");
                bad_ports.insert(port);
            }
            Err(ProbeFault::Primary(e)) => {
                warn!(port = %primary, error = %e, "Primary port failed during identification");
                break;
            }
        }
    }

    drop(primary_conn);
    found
}

fn find_primary<P: PortProvider + ?Sized>(
    provider: &P,
    options: &DiscoveryOptions,
    candidates: &[String],
    bad_ports: &mut HashSet<String>,
) -> Option<String> {
    for port in candidates {
        debug!(port = %port, "Testing primary port");
        match probe_beacon(provider, options, port) {
            Ok(Probe::Match(())) => return Some(port.clone()),
            Ok(Probe::NoMatch) => debug!(port = %port, "No beacon"),
            Err(e) => {
                warn!(port = %port, error = %e, "Bad port");
                bad_ports.insert(port.clone());
            }
        }
    }
    None
}

/// Open `port` and wait up to the probe timeout for the beacon byte.
fn probe_beacon<P: PortProvider + ?Sized>(
    provider: &P,
    options: &DiscoveryOptions,
    port: &str,
) -> Result<Probe<()>, TransportError> {
    let mut conn = provider.open(port, options.baud_rate, options.probe_timeout)?;
    match conn.read(1) {
        Ok(bytes) if bytes.first() == Some(&PRIMARY_PORT_BEACON) => Ok(Probe::Match(())),
        Ok(_) => Ok(Probe::NoMatch),
        Err(e) if e.is_timeout() => Ok(Probe::NoMatch),
        Err(e) => Err(e),
    }
}

/// Ask the device, through the primary port, to answer on its secondary and
/// analog ports; report the byte that arrives on `port`.
fn probe_role<P: PortProvider + ?Sized>(
    provider: &P,
    options: &DiscoveryOptions,
    primary: &mut dyn SerialTransport,
    port: &str,
) -> Result<Probe<u8>, ProbeFault> {
    let mut conn = provider
        .open(port, options.baud_rate, options.probe_timeout)
        .map_err(ProbeFault::Candidate)?;
    primary
        .write(&[OP_SECONDARY_PORT_HANDSHAKE])
        .and_then(|()| primary.write(&[OP_ANALOG_PORT_HANDSHAKE]))
        .map_err(ProbeFault::Primary)?;
    match conn.read(1) {
        Ok(bytes) => Ok(bytes.first().map_or(Probe::NoMatch, |&b| Probe::Match(b))),
        Err(e) if e.is_timeout() => Ok(Probe::NoMatch),
        Err(e) => Err(ProbeFault::Candidate(e)),
    }
}
