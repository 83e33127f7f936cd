//! Trial timestamps, event reads and analog samples.
//!
//! The device clock is read in two units: 64-bit microsecond ticks at trial
//! start and end, and 32-bit timer cycles for events within a trial.

use tracing::{debug, trace};

use super::{BpodDriver, Connection, Role};
use crate::error::Result;
use crate::protocol::constants::DEFAULT_FREQUENCY_DIVIDER;
use crate::protocol::{Decoder, WireRead};

/// Clock reference of the current trial.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimestampState {
    /// Raw device ticks at trial start.
    pub trial_start_ticks: u64,
    /// `trial_start_ticks` in seconds.
    pub trial_start_timestamp: f64,
}

/// End-of-trial timing report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialEnd {
    /// Timer cycles elapsed during the trial, as counted by the device.
    pub hw_timer_cycles: u32,
    /// Trial end in seconds of device time.
    pub end_timestamp: f64,
    /// Disagreement between tick-based and cycle-based trial durations, in ms.
    pub discrepancy_ms: f64,
}

/// One analog sample group: the trial index followed by one sample per
/// analog input channel, in channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalogFrame {
    pub trial_index: u16,
    pub samples: Vec<u16>,
}

impl AnalogFrame {
    /// Group a flat sample stream into frames of `n_channels + 1` values.
    /// A trailing partial group is dropped.
    pub fn split(values: &[u16], n_channels: usize) -> Vec<AnalogFrame> {
        values
            .chunks_exact(n_channels + 1)
            .map(|group| AnalogFrame {
                trial_index: group[0],
                samples: group[1..].to_vec(),
            })
            .collect()
    }
}

/// Device ticks to seconds.
pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / DEFAULT_FREQUENCY_DIVIDER
}

/// Absolute difference, in milliseconds, between the trial duration measured
/// in ticks and the one derived from the timer cycle count.
pub fn trial_discrepancy_ms(
    start_timestamp: f64,
    end_timestamp: f64,
    hw_timer_cycles: u32,
    cycle_frequency: f64,
) -> f64 {
    let from_ticks = end_timestamp - start_timestamp;
    let from_cycles = hw_timer_cycles as f64 / cycle_frequency;
    (from_ticks - from_cycles).abs() * 1000.0
}

/// Number of whole analog groups in `bytes_available` bytes.
pub fn complete_analog_groups(bytes_available: usize, n_channels: usize) -> usize {
    bytes_available / (2 * (n_channels + 1))
}

/// Read every complete sample group waiting on `conn`.
fn drain_analog(conn: &mut Connection, n_channels: usize) -> Result<Vec<u16>> {
    let available = conn.bytes_available()?;
    let groups = complete_analog_groups(available, n_channels);
    if groups == 0 {
        return Ok(Vec::new());
    }
    trace!(available, groups, "Reading analog samples");
    conn.u16_array(groups * (n_channels + 1))
}

/// The analog connection, detached from its driver.
///
/// Owns the port outright, so a sampling thread can drain it while the
/// driver keeps issuing commands on the primary port. Dropping the reader
/// closes the port.
pub struct AnalogReader {
    conn: Connection,
}

impl AnalogReader {
    pub fn port_name(&self) -> &str {
        self.conn.port_name()
    }

    /// Same contract as [`BpodDriver::read_analog_input_samples`].
    pub fn read_samples(&mut self, n_channels: usize) -> Result<Vec<u16>> {
        drain_analog(&mut self.conn, n_channels)
    }

    pub fn read_frames(&mut self, n_channels: usize) -> Result<Vec<AnalogFrame>> {
        let values = self.read_samples(n_channels)?;
        Ok(AnalogFrame::split(&values, n_channels))
    }
}

impl BpodDriver {
    /// Detach the analog connection for use on another thread.
    ///
    /// Afterwards the driver reports the analog role as not connected.
    pub fn take_analog(&mut self) -> Option<AnalogReader> {
        let conn = self.connections.take(Role::Analog)?;
        debug!(port = %conn.port_name(), "Analog port detached");
        Some(AnalogReader { conn })
    }

    /// Read the 64-bit trial start time and make it the reference for
    /// [`read_timestamps`](Self::read_timestamps).
    pub fn read_trial_start_timestamp(&mut self) -> Result<f64> {
        let ticks = self.connections.get(Role::Primary)?.u64()?;
        self.timestamps = TimestampState {
            trial_start_ticks: ticks,
            trial_start_timestamp: ticks_to_seconds(ticks),
        };
        debug!(ticks, seconds = self.timestamps.trial_start_timestamp, "Trial start");
        Ok(self.timestamps.trial_start_timestamp)
    }

    /// Read a 32-bit trial start time in timer cycles, in seconds.
    pub fn read_trial_start_timestamp_seconds(&mut self) -> Result<f64> {
        let scale = self.hardware_required()?.times_scale_factor;
        let cycles = self.connections.get(Role::Primary)?.u32()?;
        Ok(cycles as f64 * scale)
    }

    /// Read one event timestamp, in seconds.
    pub fn read_event_timestamp(&mut self) -> Result<f64> {
        let scale = self.hardware_required()?.times_scale_factor;
        let cycles = self.connections.get(Role::Primary)?.u32()?;
        Ok(cycles as f64 * scale)
    }

    /// Read the end-of-trial report: cycle count, then end ticks.
    pub fn read_timestamps(&mut self) -> Result<TrialEnd> {
        let cycle_frequency = self.hardware_required()?.cycle_frequency;
        let data = self.connections.get(Role::Primary)?.take(12)?;
        let mut decoder = Decoder::new(&data);
        let hw_timer_cycles = decoder.u32()?;
        let end_ticks = decoder.u64()?;

        let end_timestamp = ticks_to_seconds(end_ticks);
        let discrepancy_ms = trial_discrepancy_ms(
            self.timestamps.trial_start_timestamp,
            end_timestamp,
            hw_timer_cycles,
            cycle_frequency,
        );
        debug!(hw_timer_cycles, end_timestamp, discrepancy_ms, "Trial end");
        Ok(TrialEnd {
            hw_timer_cycles,
            end_timestamp,
            discrepancy_ms,
        })
    }

    /// Read an opcode message: opcode and its data byte.
    pub fn read_opcode_message(&mut self) -> Result<(u8, u8)> {
        let conn = self.connections.get(Role::Primary)?;
        let opcode = conn.u8()?;
        let data = conn.u8()?;
        debug!(opcode, data, "Opcode message");
        Ok((opcode, data))
    }

    /// Read a counted block of raw 32-bit timestamps.
    pub fn read_alltimestamps(&mut self) -> Result<Vec<u32>> {
        let conn = self.connections.get(Role::Primary)?;
        let n_timestamps = conn.u16()? as usize;
        let timestamps = conn.u32_array(n_timestamps)?;
        debug!(?timestamps, "Timestamps");
        Ok(timestamps)
    }

    pub fn read_current_events(&mut self, n_events: usize) -> Result<Vec<u8>> {
        let events = self.connections.get(Role::Primary)?.u8_array(n_events)?;
        debug!(?events, "Current events");
        Ok(events)
    }

    /// Drain every complete sample group waiting on the analog port.
    ///
    /// Never waits for a partial group; returns an empty vector when none is
    /// complete yet.
    pub fn read_analog_input_samples(&mut self, n_channels: usize) -> Result<Vec<u16>> {
        drain_analog(self.connections.get(Role::Analog)?, n_channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::tests::driver_with_hardware;
    use crate::error::BpodError;
    use crate::protocol::constants::{OP_RESET_CLOCK, RSP_RESET_CLOCK_OK};
    use crate::transport::MockTransport;

    #[test]
    fn test_tick_scaling_is_linear() {
        let a = ticks_to_seconds(1_500_000);
        assert_eq!(a, ticks_to_seconds(1_500_000));
        assert_eq!(a, 1.5);
        assert_eq!(ticks_to_seconds(3_000_000), 2.0 * a);
        assert_eq!(ticks_to_seconds(0), 0.0);
    }

    #[test]
    fn test_discrepancy() {
        // 2s by ticks, 20_000 cycles at 10 kHz is also 2s
        assert_eq!(trial_discrepancy_ms(1.0, 3.0, 20_000, 10_000.0), 0.0);
        // 1.99s by cycles
        let d = trial_discrepancy_ms(1.0, 3.0, 19_900, 10_000.0);
        assert!((d - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_analog_group_count() {
        assert_eq!(complete_analog_groups(0, 2), 0);
        assert_eq!(complete_analog_groups(5, 2), 0);
        assert_eq!(complete_analog_groups(6, 2), 1);
        assert_eq!(complete_analog_groups(13, 2), 2);
        assert_eq!(complete_analog_groups(4, 0), 2);
    }

    #[test]
    fn test_analog_frame_split() {
        let frames = AnalogFrame::split(&[1, 10, 20, 1, 11, 21, 2], 2);
        assert_eq!(
            frames,
            vec![
                AnalogFrame { trial_index: 1, samples: vec![10, 20] },
                AnalogFrame { trial_index: 1, samples: vec![11, 21] },
            ]
        );
    }

    #[test]
    fn test_trial_timestamps() {
        // 100us cycle period
        let (mut driver, port) = driver_with_hardware(&[b'B'], &[b'V']);

        port.queue_u64(2_000_000);
        assert_eq!(driver.read_trial_start_timestamp().unwrap(), 2.0);
        assert_eq!(driver.timestamps().trial_start_ticks, 2_000_000);

        port.queue_u32(15);
        let t = driver.read_event_timestamp().unwrap();
        assert!((t - 0.0015).abs() < 1e-12);

        port.queue_u32(10_000);
        port.queue_u64(3_000_000);
        let end = driver.read_timestamps().unwrap();
        assert_eq!(end.hw_timer_cycles, 10_000);
        assert_eq!(end.end_timestamp, 3.0);
        assert!(end.discrepancy_ms.abs() < 1e-9);
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn test_event_timestamp_needs_hardware() {
        let port = MockTransport::new("ttyACM0");
        let mut driver = BpodDriver::from_connections(Box::new(port.clone()), None, None);
        port.queue_u32(1);
        assert!(matches!(
            driver.read_event_timestamp(),
            Err(BpodError::HardwareNotNegotiated)
        ));
        assert_eq!(port.pending(), 4);
    }

    #[test]
    fn test_event_reads() {
        let port = MockTransport::new("ttyACM0");
        let mut driver = BpodDriver::from_connections(Box::new(port.clone()), None, None);

        port.queue_bytes(&[3, 42]);
        assert_eq!(driver.read_opcode_message().unwrap(), (3, 42));

        port.queue_u16(2);
        port.queue_u32(100);
        port.queue_u32(250);
        assert_eq!(driver.read_alltimestamps().unwrap(), vec![100, 250]);

        port.queue_bytes(&[5, 6, 7]);
        assert_eq!(driver.read_current_events(3).unwrap(), vec![5, 6, 7]);
        assert_eq!(port.pending(), 0);
    }

    #[test]
    fn test_analog_samples() {
        let primary = MockTransport::new("ttyACM0");
        let analog = MockTransport::new("ttyACM2");
        let mut driver = BpodDriver::from_connections(
            Box::new(primary),
            None,
            Some(Box::new(analog.clone())),
        );

        assert!(driver.read_analog_input_samples(2).unwrap().is_empty());

        for value in [1u16, 512, 1024] {
            analog.queue_u16(value);
        }
        // Start of the next group
        analog.queue_u8(2);
        assert_eq!(driver.read_analog_input_samples(2).unwrap(), vec![1, 512, 1024]);
        assert_eq!(analog.pending(), 1);
    }

    #[test]
    fn test_analog_samples_need_analog_port() {
        let port = MockTransport::new("ttyACM0");
        let mut driver = BpodDriver::from_connections(Box::new(port), None, None);
        assert!(matches!(
            driver.read_analog_input_samples(1),
            Err(BpodError::RoleNotConnected(Role::Analog))
        ));
    }

    #[test]
    fn test_analog_reader_runs_beside_commands() {
        let primary = MockTransport::new("ttyACM0");
        let analog = MockTransport::new("ttyACM2");
        let mut driver = BpodDriver::from_connections(
            Box::new(primary.clone()),
            None,
            Some(Box::new(analog.clone())),
        );
        for value in [1u16, 100, 200, 1, 101, 201] {
            analog.queue_u16(value);
        }

        let mut reader = driver.take_analog().unwrap();
        assert_eq!(reader.port_name(), "ttyACM2");
        assert!(!driver.is_connected(Role::Analog));
        assert!(driver.take_analog().is_none());

        let sampler = std::thread::spawn(move || reader.read_frames(2).unwrap());

        primary.queue_u8(RSP_RESET_CLOCK_OK);
        assert!(driver.reset_clock().unwrap());
        assert_eq!(primary.written_bytes(), vec![OP_RESET_CLOCK]);

        let frames = sampler.join().unwrap();
        assert_eq!(
            frames,
            vec![
                AnalogFrame { trial_index: 1, samples: vec![100, 200] },
                AnalogFrame { trial_index: 1, samples: vec![101, 201] },
            ]
        );
        assert_eq!(analog.pending(), 0);
        assert!(matches!(
            driver.read_analog_input_samples(2),
            Err(BpodError::RoleNotConnected(Role::Analog))
        ));
    }
}
