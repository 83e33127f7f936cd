//! Hardware capabilities negotiated from the state machine.
//!
//! The hardware description is a fixed-order sequence of fields whose layout
//! depends on the firmware version, so it is read field by field into a
//! typed record rather than a generic map.

use std::fmt;

use crate::protocol::constants::*;
use crate::protocol::WireRead;

/// Raw hardware description, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareDescription {
    pub max_states: u16,
    /// Timer period in microseconds.
    pub cycle_period: u16,
    pub max_serial_events: u8,
    pub serial_message_max_bytes: u8,
    pub n_global_timers: u8,
    pub n_global_counters: u8,
    pub n_conditions: u8,
    pub inputs: Vec<char>,
    pub outputs: Vec<char>,
}

impl HardwareDescription {
    /// Read the description body that follows the `H` opcode.
    ///
    /// Firmware up to v22 has no serial-message size field; it defaults to 3.
    pub fn read_from<R: WireRead>(reader: &mut R, firmware_version: u16) -> Result<Self, R::Error> {
        let max_states = reader.u16()?;
        let cycle_period = reader.u16()?;
        let max_serial_events = reader.u8()?;
        let serial_message_max_bytes = if firmware_version > SERIAL_MESSAGE_MAX_BYTES_MIN_FIRMWARE {
            reader.u8()?
        } else {
            DEFAULT_SERIAL_MESSAGE_MAX_BYTES
        };
        let n_global_timers = reader.u8()?;
        let n_global_counters = reader.u8()?;
        let n_conditions = reader.u8()?;
        let n_inputs = reader.u8()? as usize;
        let inputs = reader.char_array(n_inputs)?;
        let n_outputs = reader.u8()? as usize;
        let outputs = reader.char_array(n_outputs)?;

        Ok(Self {
            max_states,
            cycle_period,
            max_serial_events,
            serial_message_max_bytes,
            n_global_timers,
            n_global_counters,
            n_conditions,
            inputs,
            outputs,
        })
    }
}

/// Per-role input enablement, overlaid onto the physical input list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortsEnabled {
    pub bnc: Vec<bool>,
    pub wired: Vec<bool>,
    pub behavior: Vec<bool>,
    pub flex: Vec<bool>,
}

/// Configuration of one Flex channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FlexChannelType {
    DigitalIn = 0,
    DigitalOut = 1,
    AnalogIn = 2,
    AnalogOut = 3,
}

impl FlexChannelType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::DigitalIn),
            1 => Some(Self::DigitalOut),
            2 => Some(Self::AnalogIn),
            3 => Some(Self::AnalogOut),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// What a triggered analog threshold does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThresholdMode {
    /// Threshold disables itself until re-enabled by the state machine.
    Disable = 0,
    /// Threshold re-enables the other threshold before disabling itself.
    ReenableOther = 1,
}

/// Negotiated hardware limits and channel layout.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareCapabilities {
    pub firmware_version: u16,
    pub machine_type: u16,
    pub max_states: u16,
    pub cycle_period: u16,
    pub max_serial_events: u8,
    pub serial_message_max_bytes: u8,
    pub n_global_timers: u8,
    pub n_global_counters: u8,
    pub n_conditions: u8,
    pub inputs: Vec<char>,
    pub outputs: Vec<char>,
    pub n_uart_channels: usize,
    pub n_flex_channels: usize,
    pub live_timestamps: bool,
    /// Last bitmap sent with enable-ports; all disabled until then.
    pub inputs_enabled: Vec<bool>,
    pub input_channel_names: Vec<String>,
    pub output_channel_names: Vec<String>,
    pub bnc_input_indexes: Vec<usize>,
    pub wired_input_indexes: Vec<usize>,
    pub behavior_input_indexes: Vec<usize>,
    pub flex_input_indexes: Vec<usize>,
    /// Timer cycles per second.
    pub cycle_frequency: f64,
    /// Seconds per timer cycle, applied to 32-bit event timestamps.
    pub times_scale_factor: f64,
}

impl HardwareCapabilities {
    pub fn new(
        firmware_version: u16,
        machine_type: u16,
        description: HardwareDescription,
        live_timestamps: bool,
    ) -> Self {
        let HardwareDescription {
            max_states,
            cycle_period,
            max_serial_events,
            serial_message_max_bytes,
            n_global_timers,
            n_global_counters,
            n_conditions,
            inputs,
            outputs,
        } = description;

        let count = |code: char| inputs.iter().filter(|&&c| c == code).count();
        let indexes = |code: char| -> Vec<usize> {
            inputs
                .iter()
                .enumerate()
                .filter(|(_, c)| **c == code)
                .map(|(i, _)| i)
                .collect()
        };

        let (cycle_frequency, times_scale_factor) = if cycle_period == 0 {
            (0.0, 0.0)
        } else {
            let period = cycle_period as f64;
            (DEFAULT_FREQUENCY_DIVIDER / period, period / DEFAULT_FREQUENCY_DIVIDER)
        };

        Self {
            firmware_version,
            machine_type,
            max_states,
            cycle_period,
            max_serial_events,
            serial_message_max_bytes,
            n_global_timers,
            n_global_counters,
            n_conditions,
            n_uart_channels: count(INPUT_TYPE_UART),
            n_flex_channels: count(INPUT_TYPE_FLEX),
            live_timestamps,
            inputs_enabled: vec![false; inputs.len()],
            input_channel_names: channel_names(&inputs, input_prefix),
            output_channel_names: channel_names(&outputs, output_prefix),
            bnc_input_indexes: indexes(INPUT_TYPE_BNC),
            wired_input_indexes: indexes(INPUT_TYPE_WIRE),
            behavior_input_indexes: indexes(INPUT_TYPE_PORT),
            flex_input_indexes: indexes(INPUT_TYPE_FLEX),
            cycle_frequency,
            times_scale_factor,
            inputs,
            outputs,
        }
    }

    /// Overlay the four enablement lists onto the physical input positions.
    ///
    /// Lists are paired with their index list position by position; inputs
    /// not covered by any list stay disabled.
    pub fn compute_inputs_enabled(&self, enabled: &PortsEnabled) -> Vec<bool> {
        let mut bitmap = vec![false; self.inputs.len()];
        let overlays = [
            (&self.bnc_input_indexes, &enabled.bnc),
            (&self.wired_input_indexes, &enabled.wired),
            (&self.behavior_input_indexes, &enabled.behavior),
            (&self.flex_input_indexes, &enabled.flex),
        ];
        for (indexes, values) in overlays {
            for (&i, &v) in indexes.iter().zip(values.iter()) {
                bitmap[i] = v;
            }
        }
        bitmap
    }

    /// Position of `name` + `number` (e.g. `Port` 2 -> "Port2") among inputs.
    pub fn input_index(&self, name: &str, number: u8) -> Option<usize> {
        let full = format!("{}{}", name, number);
        self.input_channel_names.iter().position(|n| *n == full)
    }

    /// Position of `name` + `number` (e.g. `Valve` 1 -> "Valve1") among outputs.
    pub fn output_index(&self, name: &str, number: u8) -> Option<usize> {
        let full = format!("{}{}", name, number);
        self.output_channel_names.iter().position(|n| *n == full)
    }

    /// Multi-port hardware with reconfigurable Flex channels.
    pub fn has_flex_channels(&self) -> bool {
        self.n_flex_channels > 0
    }
}

impl fmt::Display for HardwareCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Firmware version:      {}", self.firmware_version)?;
        writeln!(f, "Machine type:          {}", self.machine_type)?;
        writeln!(f, "Max states:            {}", self.max_states)?;
        writeln!(f, "Cycle period (us):     {}", self.cycle_period)?;
        writeln!(f, "Max serial events:     {}", self.max_serial_events)?;
        writeln!(f, "Serial message bytes:  {}", self.serial_message_max_bytes)?;
        writeln!(f, "Global timers:         {}", self.n_global_timers)?;
        writeln!(f, "Global counters:       {}", self.n_global_counters)?;
        writeln!(f, "Conditions:            {}", self.n_conditions)?;
        writeln!(f, "UART channels:         {}", self.n_uart_channels)?;
        writeln!(f, "Flex channels:         {}", self.n_flex_channels)?;
        writeln!(f, "Live timestamps:       {}", self.live_timestamps)?;
        writeln!(f, "Inputs:                {}", self.input_channel_names.join(", "))?;
        write!(f, "Outputs:               {}", self.output_channel_names.join(", "))
    }
}

fn input_prefix(code: char) -> Option<&'static str> {
    match code {
        INPUT_TYPE_BNC => Some("BNC"),
        INPUT_TYPE_WIRE => Some("Wire"),
        INPUT_TYPE_PORT => Some("Port"),
        INPUT_TYPE_FLEX => Some("Flex"),
        INPUT_TYPE_UART => Some("Serial"),
        INPUT_TYPE_USB => Some("USB"),
        _ => None,
    }
}

fn output_prefix(code: char) -> Option<&'static str> {
    match code {
        OUTPUT_TYPE_BNC => Some("BNC"),
        OUTPUT_TYPE_WIRE => Some("Wire"),
        OUTPUT_TYPE_PWM => Some("PWM"),
        OUTPUT_TYPE_VALVE => Some("Valve"),
        OUTPUT_TYPE_FLEX => Some("Flex"),
        OUTPUT_TYPE_UART => Some("Serial"),
        OUTPUT_TYPE_SOFTCODE => Some("SoftCode"),
        _ => None,
    }
}

/// Name channels by type, numbered from 1 per type. Unknown codes keep
/// their raw character so positions still line up.
fn channel_names(codes: &[char], prefix: fn(char) -> Option<&'static str>) -> Vec<String> {
    let mut seen: Vec<(char, u32)> = Vec::new();
    codes
        .iter()
        .map(|&code| {
            let n = match seen.iter_mut().find(|(c, _)| *c == code) {
                Some((_, n)) => {
                    *n += 1;
                    *n
                }
                None => {
                    seen.push((code, 1));
                    1
                }
            };
            match prefix(code) {
                Some(p) => format!("{}{}", p, n),
                None => format!("{}{}", code, n),
            }
        })
        .collect()
}
