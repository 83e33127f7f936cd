//! Handshakes and capability negotiation.

use tracing::{debug, info, instrument};

use super::{BpodDriver, Role};
use crate::error::Result;
use crate::hardware::{HardwareCapabilities, HardwareDescription, PortsEnabled};
use crate::protocol::constants::*;
use crate::protocol::{Request, WireRead};

impl BpodDriver {
    /// Confirm the primary port answers as a state machine.
    pub fn handshake(&mut self) -> Result<bool> {
        debug!("Requesting handshake");
        let conn = self.connections.get(Role::Primary)?;
        conn.send(&Request::new(OP_HANDSHAKE))?;
        conn.expect_ok(OP_HANDSHAKE, RSP_HANDSHAKE_OK)
    }

    /// Ask the device, through the primary port, to answer on the secondary port.
    pub fn handshake_secondary(&mut self) -> Result<bool> {
        debug!("Requesting secondary port handshake");
        self.connections.exchange(
            &Request::new(OP_SECONDARY_PORT_HANDSHAKE),
            Role::Primary,
            Role::Secondary,
            RSP_SECONDARY_PORT_HANDSHAKE_OK,
        )
    }

    /// Ask the device, through the primary port, to answer on the analog port.
    pub fn handshake_analog(&mut self) -> Result<bool> {
        debug!("Requesting analog port handshake");
        self.connections.exchange(
            &Request::new(OP_ANALOG_PORT_HANDSHAKE),
            Role::Primary,
            Role::Analog,
            RSP_ANALOG_PORT_HANDSHAKE_OK,
        )
    }

    /// Firmware version and machine type.
    pub fn firmware_version(&mut self) -> Result<(u16, u16)> {
        debug!("Requesting firmware version");
        let conn = self.connections.get(Role::Primary)?;
        conn.send(&Request::new(OP_FIRMWARE_VERSION))?;
        let firmware_version = conn.u16()?;
        let machine_type = conn.u16()?;
        debug!(firmware_version, machine_type, "Firmware version");
        self.firmware = Some((firmware_version, machine_type));
        Ok((firmware_version, machine_type))
    }

    /// Read the raw hardware description.
    ///
    /// The field layout depends on the firmware version, which is requested
    /// first if it is not known yet.
    pub fn hardware_description(&mut self) -> Result<HardwareDescription> {
        let (firmware_version, _) = match self.firmware {
            Some(fw) => fw,
            None => self.firmware_version()?,
        };
        debug!("Requesting hardware description");
        let conn = self.connections.get(Role::Primary)?;
        conn.send(&Request::new(OP_HARDWARE_DESCRIPTION))?;
        let description = HardwareDescription::read_from(conn, firmware_version)?;
        debug!(?description, "Hardware description");
        Ok(description)
    }

    /// Whether the device sends event timestamps during the trial (nonzero)
    /// or only at its end (zero).
    pub fn get_timestamp_transmission(&mut self) -> Result<u8> {
        debug!("Requesting timestamp transmission scheme");
        let conn = self.connections.get(Role::Primary)?;
        conn.send(&Request::new(OP_GET_TIMESTAMP_TRANSMISSION))?;
        let scheme = conn.u8()?;
        debug!(scheme, "Timestamp transmission scheme");
        Ok(scheme)
    }

    /// Firmware version, hardware description and timestamp scheme, in that order.
    #[instrument(skip(self))]
    pub fn negotiate(&mut self) -> Result<&HardwareCapabilities> {
        let (firmware_version, machine_type) = self.firmware_version()?;
        let description = self.hardware_description()?;
        let live_timestamps = self.get_timestamp_transmission()? != 0;

        let hardware =
            HardwareCapabilities::new(firmware_version, machine_type, description, live_timestamps);
        info!(
            firmware_version,
            machine_type,
            inputs = hardware.inputs.len(),
            outputs = hardware.outputs.len(),
            flex_channels = hardware.n_flex_channels,
            "Hardware negotiated"
        );
        let hardware: &HardwareCapabilities = self.hardware.insert(hardware);
        Ok(hardware)
    }

    /// Send the input enable bitmap built from the four per-role lists.
    ///
    /// The bitmap is recorded in the capabilities before the device answers.
    pub fn enable_ports(&mut self, enabled: &PortsEnabled) -> Result<bool> {
        let bitmap = self.hardware_required()?.compute_inputs_enabled(enabled);
        debug!(inputs_enabled = ?bitmap, "Enabling ports");
        let request = Request::new(OP_ENABLE_PORTS).bools(&bitmap);
        if let Some(hw) = self.hardware.as_mut() {
            hw.inputs_enabled = bitmap;
        }

        let conn = self.connections.get(Role::Primary)?;
        conn.send(&request)?;
        conn.expect_ok(OP_ENABLE_PORTS, RSP_ENABLE_PORTS_OK)
    }
}
