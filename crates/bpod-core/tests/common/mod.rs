//! Scripted multi-port device for integration tests.

#![allow(dead_code)]

use bpod_core::MockPortProvider;
use bpod_core::MockTransport;
use bpod_core::protocol::constants::*;

pub struct Device {
    pub primary: MockTransport,
    pub secondary: MockTransport,
    pub analog: MockTransport,
}

/// Hardware description body with a 100us cycle period.
pub fn hardware_bytes(firmware_version: u16, inputs: &[u8], outputs: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&256u16.to_le_bytes());
    bytes.extend_from_slice(&100u16.to_le_bytes());
    bytes.push(60);
    if firmware_version > SERIAL_MESSAGE_MAX_BYTES_MIN_FIRMWARE {
        bytes.push(5);
    }
    bytes.extend_from_slice(&[16, 8, 16]);
    bytes.push(inputs.len() as u8);
    bytes.extend_from_slice(inputs);
    bytes.push(outputs.len() as u8);
    bytes.extend_from_slice(outputs);
    bytes
}

/// Answer handshake and negotiation opcodes written to the primary port.
pub fn script_primary(primary: &MockTransport, firmware_version: u16, inputs: &[u8], outputs: &[u8]) {
    primary.respond_on(OP_HANDSHAKE, primary, &[RSP_HANDSHAKE_OK]);
    let mut firmware = firmware_version.to_le_bytes().to_vec();
    firmware.extend_from_slice(&4u16.to_le_bytes());
    primary.respond_on(OP_FIRMWARE_VERSION, primary, &firmware);
    primary.respond_on(
        OP_HARDWARE_DESCRIPTION,
        primary,
        &hardware_bytes(firmware_version, inputs, outputs),
    );
    primary.respond_on(OP_GET_TIMESTAMP_TRANSMISSION, primary, &[1]);
}

/// A three-port state machine. The secondary port is listed first so the
/// beacon scan has to skip it.
pub fn three_port_device(provider: &MockPortProvider, firmware_version: u16) -> Device {
    let secondary = provider.add_port("/dev/ttyACM1");
    let primary = provider.add_port("/dev/ttyACM0");
    let analog = provider.add_port("/dev/ttyACM2");

    primary.queue_u8(PRIMARY_PORT_BEACON);
    primary.respond_on(OP_SECONDARY_PORT_HANDSHAKE, &secondary, &[RSP_SECONDARY_PORT_HANDSHAKE_OK]);
    primary.respond_on(OP_ANALOG_PORT_HANDSHAKE, &analog, &[RSP_ANALOG_PORT_HANDSHAKE_OK]);
    script_primary(&primary, firmware_version, b"UUFFFFBBWWPPPP", b"UUFFFFBBWWPPPPVVVV");

    Device {
        primary,
        secondary,
        analog,
    }
}
