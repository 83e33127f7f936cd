//! Commands on the primary port.
//!
//! Most commands are an opcode plus a short payload. Those that the device
//! acknowledges return `Ok(true)` on the expected response code and
//! `Ok(false)` otherwise; the rest are fire-and-forget.

use std::str::FromStr;

use tracing::{debug, instrument};

use super::{BpodDriver, Role};
use crate::error::{BpodError, Result};
use crate::hardware::{FlexChannelType, ThresholdMode};
use crate::protocol::constants::*;
use crate::protocol::{Request, WireRead};
use crate::slots::MessageSlots;

/// Which channel table a manual override addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelCategory {
    Input,
    Output,
}

impl FromStr for ChannelCategory {
    type Err = BpodError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            _ => Err(BpodError::InvalidChannelCategory),
        }
    }
}

/// Something addressable as a 1-based hardware serial channel, such as a
/// module attached to one of the state machine's UARTs.
pub trait SerialChannel {
    fn serial_channel(&self) -> u8;
}

impl SerialChannel for u8 {
    fn serial_channel(&self) -> u8 {
        *self
    }
}

impl BpodDriver {
    fn send(&mut self, request: &Request) -> Result<()> {
        self.connections.get(Role::Primary)?.send(request)
    }

    /// Send `request` and compare the one-byte answer with `expected`.
    fn send_and_confirm(&mut self, request: &Request, expected: u8) -> Result<bool> {
        let conn = self.connections.get(Role::Primary)?;
        conn.send(request)?;
        conn.expect_ok(request.opcode(), expected)
    }

    /// Tell the device the host is leaving. Connections stay open.
    pub fn disconnect(&mut self) -> Result<bool> {
        debug!("Disconnecting state machine");
        self.send_and_confirm(&Request::new(OP_DISCONNECT), RSP_DISCONNECT_OK)
    }

    pub fn reset_clock(&mut self) -> Result<bool> {
        debug!("Resetting clock");
        self.send_and_confirm(&Request::new(OP_RESET_CLOCK), RSP_RESET_CLOCK_OK)
    }

    pub fn pause_trial(&mut self) -> Result<()> {
        debug!("Pausing trial");
        self.send(&Request::new(OP_PAUSE_TRIAL).u8(0))
    }

    pub fn resume_trial(&mut self) -> Result<()> {
        debug!("Resuming trial");
        self.send(&Request::new(OP_PAUSE_TRIAL).u8(1))
    }

    /// Exit the running state machine and return its data.
    pub fn stop_trial(&mut self) -> Result<()> {
        debug!("Stopping trial");
        self.send(&Request::new(OP_EXIT_AND_RETURN))
    }

    /// Ask the device to send `softcode` back as an event.
    pub fn echo_softcode(&mut self, softcode: u8) -> Result<()> {
        debug!(softcode, "Echoing softcode");
        self.send(&Request::new(OP_ECHO_SOFTCODE).u8(softcode))
    }

    pub fn trigger_softcode(&mut self, softcode: u8) -> Result<()> {
        debug!(softcode, "Triggering softcode");
        self.send(&Request::new(OP_TRIGGER_SOFTCODE).u8(softcode))
    }

    /// Inject a virtual event into the running state machine.
    pub fn manual_override_exec_event(&mut self, event_index: u8, event_data: u8) -> Result<()> {
        debug!(event_index, event_data, "Executing virtual event");
        self.send(
            &Request::new(OP_MANUAL_OVERRIDE_EXEC_EVENT)
                .u8(event_index)
                .u8(event_data),
        )
    }

    pub fn override_input_state(&mut self, channel: u8, value: u8) -> Result<()> {
        debug!(channel, value, "Overriding input state");
        self.send(
            &Request::new(OP_MANUAL_OVERRIDE_EXEC_EVENT)
                .u8(channel)
                .u8(value),
        )
    }

    pub fn override_digital_hardware_state(&mut self, channel: u8, value: u8) -> Result<()> {
        debug!(channel, value, "Overriding digital output state");
        self.send(&Request::new(OP_OVERRIDE_DIGITAL_HW_STATE).u8(channel).u8(value))
    }

    /// Write one byte out of hardware serial channel `channel` (1-based).
    pub fn send_byte_to_hardware_serial(&mut self, channel: u8, value: u8) -> Result<()> {
        debug!(channel, value, "Sending byte to hardware serial");
        self.send(&Request::new(OP_SEND_TO_HW_SERIAL).u8(channel).u8(value))
    }

    /// Override a channel by name, e.g. (`Output`, "Valve", 1) or (`Input`, "Port", 3).
    ///
    /// The `Serial` output routes `value` to serial channel `number` instead
    /// of overriding a digital line.
    pub fn manual_override(
        &mut self,
        category: ChannelCategory,
        name: &str,
        number: u8,
        value: u8,
    ) -> Result<()> {
        if category == ChannelCategory::Output && name == SERIAL_OUTPUT_NAME {
            return self.send_byte_to_hardware_serial(number, value);
        }

        let hw = self.hardware_required()?;
        let index = match category {
            ChannelCategory::Input => hw.input_index(name, number),
            ChannelCategory::Output => hw.output_index(name, number),
        };
        let index = index
            .and_then(|i| u8::try_from(i).ok())
            .ok_or_else(|| BpodError::InvalidChannel {
                name: format!("{}{}", name, number),
            })?;

        match category {
            ChannelCategory::Input => self.override_input_state(index, value),
            ChannelCategory::Output => self.override_digital_hardware_state(index, value),
        }
    }

    /// Send a compiled state machine. The buffer already carries its opcode.
    pub fn send_state_machine(&mut self, message: &[u8]) -> Result<()> {
        debug!(len = message.len(), "Sending state machine");
        self.connections.get(Role::Primary)?.send_raw(message)
    }

    pub fn run_state_machine(&mut self) -> Result<()> {
        debug!("Running state machine");
        self.send(&Request::new(OP_RUN_STATE_MACHINE))
    }

    /// Read the acknowledgment that follows a state machine upload.
    pub fn state_machine_installation_status(&mut self) -> Result<bool> {
        self.connections
            .get(Role::Primary)?
            .expect_ok(OP_SEND_STATE_MACHINE, RSP_STATE_MACHINE_INSTALLATION_OK)
    }

    /// Configure the sync output. Channel 255 disables it.
    pub fn set_sync_channel_and_mode(&mut self, sync_channel: u8, sync_mode: u8) -> Result<bool> {
        debug!(sync_channel, sync_mode, "Setting sync channel and mode");
        let request = Request::new(OP_SYNC_CHANNEL_MODE).u8(sync_channel).u8(sync_mode);
        self.send_and_confirm(&request, RSP_SYNC_CHANNEL_MODE_OK)
    }

    /// Store `message` on the device as `message_id` for `channel`.
    ///
    /// The message is validated before any I/O; once valid, its slot is
    /// marked loaded whether or not the device confirms.
    #[instrument(skip(self, channel, message), fields(serial_channel = channel.serial_channel()))]
    pub fn load_serial_message<C: SerialChannel>(
        &mut self,
        channel: C,
        message_id: u32,
        message: &[u8],
        n_messages: u8,
    ) -> Result<bool> {
        let max_bytes = self.serial_message_max_bytes();
        if message.len() > max_bytes as usize {
            return Err(BpodError::MessageTooLong {
                len: message.len(),
                max_bytes,
            });
        }
        if !MessageSlots::is_valid_id(message_id) {
            return Err(BpodError::InvalidMessageId { id: message_id });
        }
        let slot = message_id as u8;
        let channel = channel.serial_channel();
        if channel == 0 {
            return Err(BpodError::InvalidChannel {
                name: format!("{}{}", SERIAL_OUTPUT_NAME, channel),
            });
        }

        self.message_slots.mark(slot);
        // Length fits in a byte since max_bytes does
        let request = Request::new(OP_LOAD_SERIAL_MESSAGE)
            .u8(channel - 1)
            .u8(n_messages)
            .u8(slot)
            .u8(message.len() as u8)
            .bytes(message);
        debug!(slot, len = message.len(), "Loading serial message");
        self.send_and_confirm(&request, RSP_LOAD_SERIAL_MESSAGE_OK)
    }

    /// Erase every stored serial message on the device.
    ///
    /// The local slot table is left alone; see [`BpodDriver::clear_message_slots`].
    pub fn reset_serial_messages(&mut self) -> Result<bool> {
        debug!("Resetting serial messages");
        self.send_and_confirm(&Request::new(OP_RESET_SERIAL_MESSAGES), RSP_RESET_SERIAL_MESSAGES_OK)
    }

    pub fn set_flex_channel_types(&mut self, types: &[FlexChannelType]) -> Result<bool> {
        debug!(?types, "Setting flex channel types");
        let codes: Vec<u8> = types.iter().map(|t| t.code()).collect();
        let request = Request::new(OP_SET_FLEX_CHANNEL_TYPES).bytes(&codes);
        self.send_and_confirm(&request, RSP_SET_FLEX_CHANNEL_TYPES_OK)
    }

    /// Current type of every Flex channel.
    pub fn get_flex_channel_types(&mut self) -> Result<Vec<FlexChannelType>> {
        let hardware = self.hardware_required()?;
        if !hardware.has_flex_channels() {
            return Ok(Vec::new());
        }
        let n_flex = hardware.n_flex_channels;
        let conn = self.connections.get(Role::Primary)?;
        conn.send(&Request::new(OP_GET_FLEX_CHANNEL_TYPES))?;
        let codes = conn.u8_array(n_flex)?;
        let types = codes
            .into_iter()
            .map(|code| {
                FlexChannelType::from_code(code).ok_or(BpodError::UnknownFlexChannelType(code))
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(?types, "Flex channel types");
        Ok(types)
    }

    /// Analog input sampling interval, in units of the state machine cycle.
    pub fn set_analog_input_sampling_interval(&mut self, interval: u32) -> Result<bool> {
        debug!(interval, "Setting analog input sampling interval");
        let request = Request::new(OP_SET_ANALOG_INPUT_SAMPLING_INTERVAL).u32(interval);
        self.send_and_confirm(&request, RSP_SET_ANALOG_INPUT_SAMPLING_INTERVAL_OK)
    }

    /// Two thresholds per channel; both lists are indexed by Flex channel.
    pub fn set_analog_input_thresholds(
        &mut self,
        thresholds_1: &[u16],
        thresholds_2: &[u16],
    ) -> Result<bool> {
        check_same_len(thresholds_1.len(), thresholds_2.len())?;
        debug!(?thresholds_1, ?thresholds_2, "Setting analog input thresholds");
        let request = Request::new(OP_SET_ANALOG_INPUT_THRESHOLDS)
            .u16_array(thresholds_1)
            .u16_array(thresholds_2);
        self.send_and_confirm(&request, RSP_SET_ANALOG_INPUT_THRESHOLDS_OK)
    }

    /// `true` fires when the signal rises above a threshold, `false` when it falls below.
    pub fn set_analog_input_threshold_polarity(
        &mut self,
        polarity_1: &[bool],
        polarity_2: &[bool],
    ) -> Result<bool> {
        check_same_len(polarity_1.len(), polarity_2.len())?;
        debug!(?polarity_1, ?polarity_2, "Setting analog input threshold polarity");
        let request = Request::new(OP_SET_ANALOG_INPUT_THRESHOLD_POLARITY)
            .bools(polarity_1)
            .bools(polarity_2);
        self.send_and_confirm(&request, RSP_SET_ANALOG_INPUT_THRESHOLD_POLARITY_OK)
    }

    pub fn set_analog_input_threshold_mode(&mut self, modes: &[ThresholdMode]) -> Result<bool> {
        debug!(?modes, "Setting analog input threshold mode");
        let codes: Vec<u8> = modes.iter().map(|&m| m as u8).collect();
        let request = Request::new(OP_SET_ANALOG_INPUT_THRESHOLD_MODE).bytes(&codes);
        self.send_and_confirm(&request, RSP_SET_ANALOG_INPUT_THRESHOLD_MODE_OK)
    }

    /// Enable or disable threshold `threshold` (0 or 1) of Flex channel `channel`.
    pub fn enable_analog_input_threshold(
        &mut self,
        channel: u8,
        threshold: u8,
        enabled: bool,
    ) -> Result<bool> {
        debug!(channel, threshold, enabled, "Enabling analog input threshold");
        let request = Request::new(OP_ENABLE_ANALOG_INPUT_THRESHOLD)
            .u8(channel)
            .u8(threshold)
            .u8(enabled as u8);
        self.send_and_confirm(&request, RSP_ENABLE_ANALOG_INPUT_THRESHOLD_OK)
    }

    /// Whether the primary port has unread bytes.
    pub fn data_available(&mut self) -> Result<bool> {
        Ok(self.connections.get(Role::Primary)?.bytes_available()? > 0)
    }
}

fn check_same_len(first: usize, second: usize) -> Result<()> {
    if first != second {
        return Err(BpodError::InvalidChannelCount {
            expected: first,
            actual: second,
        });
    }
    Ok(())
}
