mod common;

use std::time::Duration;

use bpod_core::protocol::constants::*;
use bpod_core::{DiscoveredPorts, DiscoveryOptions, MockPortProvider, identify_ports};

fn options() -> DiscoveryOptions {
    DiscoveryOptions {
        probe_timeout: Duration::from_millis(10),
        ..Default::default()
    }
}

#[test]
fn test_identifies_all_three_roles() {
    let provider = MockPortProvider::new();
    let device = common::three_port_device(&provider, 23);

    let found = identify_ports(&provider, &options());
    assert_eq!(
        found,
        DiscoveredPorts {
            primary: Some("/dev/ttyACM0".into()),
            secondary: Some("/dev/ttyACM1".into()),
            analog: Some("/dev/ttyACM2".into()),
        }
    );
    assert!(found.is_complete());

    // Every probe connection is closed again
    assert!(!device.primary.is_open());
    assert!(!device.secondary.is_open());
    assert!(!device.analog.is_open());

    // Beacon scan stops at the primary; the analog port is only opened for
    // role probing
    assert_eq!(device.secondary.open_count(), 2);
    assert_eq!(device.primary.open_count(), 2);
    assert_eq!(device.analog.open_count(), 1);
    assert_eq!(device.analog.close_count(), 1);
}

#[test]
fn test_faulting_port_is_excluded_for_the_whole_pass() {
    let provider = MockPortProvider::new();
    provider.add_failing_port("/dev/ttyS0");
    common::three_port_device(&provider, 23);

    let found = identify_ports(&provider, &options());
    assert!(found.is_complete());

    let attempts = provider.open_attempts();
    assert_eq!(attempts.iter().filter(|p| *p == "/dev/ttyS0").count(), 1);
}

#[test]
fn test_port_failing_reads_is_excluded() {
    let provider = MockPortProvider::new();
    let flaky = provider.add_port("/dev/ttyUSB0");
    flaky.fail_reads();
    common::three_port_device(&provider, 23);

    let found = identify_ports(&provider, &options());
    assert!(found.is_complete());
    assert_eq!(
        provider
            .open_attempts()
            .iter()
            .filter(|p| *p == "/dev/ttyUSB0")
            .count(),
        1
    );
}

#[test]
fn test_candidate_failing_during_role_probing_is_skipped() {
    let provider = MockPortProvider::new();
    let primary = provider.add_port("/dev/ttyACM0");
    let flaky = provider.add_port("/dev/ttyACM1");
    let secondary = provider.add_port("/dev/ttyACM2");
    let analog = provider.add_port("/dev/ttyACM3");
    flaky.fail_reads();
    primary.queue_u8(PRIMARY_PORT_BEACON);
    primary.respond_on(
        OP_SECONDARY_PORT_HANDSHAKE,
        &secondary,
        &[RSP_SECONDARY_PORT_HANDSHAKE_OK],
    );
    primary.respond_on(OP_ANALOG_PORT_HANDSHAKE, &analog, &[RSP_ANALOG_PORT_HANDSHAKE_OK]);

    let found = identify_ports(&provider, &options());
    assert_eq!(
        found,
        DiscoveredPorts {
            primary: Some("/dev/ttyACM0".into()),
            secondary: Some("/dev/ttyACM2".into()),
            analog: Some("/dev/ttyACM3".into()),
        }
    );
    // The beacon scan never reaches it, so this is the role probe's open
    assert_eq!(flaky.open_count(), 1);
    assert!(!flaky.is_open());
}

#[test]
fn test_same_port_never_gets_two_roles() {
    let provider = MockPortProvider::new();
    let primary = provider.add_port("/dev/ttyACM0");
    let first = provider.add_port("/dev/ttyACM1");
    let second = provider.add_port("/dev/ttyACM2");
    primary.queue_u8(PRIMARY_PORT_BEACON);
    // Both candidates claim to be the secondary port
    primary.respond_on(OP_SECONDARY_PORT_HANDSHAKE, &first, &[RSP_SECONDARY_PORT_HANDSHAKE_OK]);
    primary.respond_on(OP_SECONDARY_PORT_HANDSHAKE, &second, &[RSP_SECONDARY_PORT_HANDSHAKE_OK]);

    let found = identify_ports(&provider, &options());
    assert_eq!(found.primary.as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(found.secondary.as_deref(), Some("/dev/ttyACM1"));
    assert_eq!(found.analog, None);
}

#[test]
fn test_first_beacon_wins() {
    let provider = MockPortProvider::new();
    let a = provider.add_port("/dev/ttyACM0");
    let b = provider.add_port("/dev/ttyACM1");
    a.queue_u8(PRIMARY_PORT_BEACON);
    b.queue_u8(PRIMARY_PORT_BEACON);

    let found = identify_ports(&provider, &options());
    assert_eq!(found.primary.as_deref(), Some("/dev/ttyACM0"));
    assert_ne!(found.secondary.as_deref(), Some("/dev/ttyACM0"));
    assert_ne!(found.analog.as_deref(), Some("/dev/ttyACM0"));
}

#[test]
fn test_no_beacon_leaves_everything_unresolved() {
    let provider = MockPortProvider::new();
    provider.add_port("/dev/ttyUSB0");
    provider.add_failing_port("/dev/ttyS0");

    let found = identify_ports(&provider, &options());
    assert_eq!(found, DiscoveredPorts::default());
}
