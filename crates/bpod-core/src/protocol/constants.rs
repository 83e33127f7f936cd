pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// Device clock ticks per second for 64-bit trial start/end timestamps.
pub const DEFAULT_FREQUENCY_DIVIDER: f64 = 1_000_000.0;

// Hardware description layout switch
pub const SERIAL_MESSAGE_MAX_BYTES_MIN_FIRMWARE: u16 = 22;
pub const DEFAULT_SERIAL_MESSAGE_MAX_BYTES: u8 = 3;

pub const MAX_SERIAL_MESSAGES: usize = 255;
pub const NO_SYNC_CHANNEL: u8 = 255;

// Host -> device opcodes
pub const OP_HANDSHAKE: u8 = b'6';
pub const OP_FIRMWARE_VERSION: u8 = b'F';
pub const OP_HARDWARE_DESCRIPTION: u8 = b'H';
pub const OP_ENABLE_PORTS: u8 = b'E';
pub const OP_SYNC_CHANNEL_MODE: u8 = b'K';
pub const OP_RESET_CLOCK: u8 = b'*';
pub const OP_PAUSE_TRIAL: u8 = b'$';
pub const OP_GET_TIMESTAMP_TRANSMISSION: u8 = b'G';
pub const OP_ECHO_SOFTCODE: u8 = b'S';
pub const OP_MANUAL_OVERRIDE_EXEC_EVENT: u8 = b'V';
pub const OP_TRIGGER_SOFTCODE: u8 = b'~';
pub const OP_SEND_STATE_MACHINE: u8 = b'C';
pub const OP_RUN_STATE_MACHINE: u8 = b'R';
pub const OP_LOAD_SERIAL_MESSAGE: u8 = b'L';
pub const OP_RESET_SERIAL_MESSAGES: u8 = b'>';
pub const OP_OVERRIDE_DIGITAL_HW_STATE: u8 = b'O';
pub const OP_SEND_TO_HW_SERIAL: u8 = b'U';
pub const OP_DISCONNECT: u8 = b'Z';
pub const OP_EXIT_AND_RETURN: u8 = b'X';
pub const OP_SECONDARY_PORT_HANDSHAKE: u8 = b'{';
pub const OP_ANALOG_PORT_HANDSHAKE: u8 = b'}';
pub const OP_SET_FLEX_CHANNEL_TYPES: u8 = b'^';
pub const OP_GET_FLEX_CHANNEL_TYPES: u8 = b'2';
pub const OP_SET_ANALOG_INPUT_SAMPLING_INTERVAL: u8 = b'%';
pub const OP_SET_ANALOG_INPUT_THRESHOLDS: u8 = b't';
pub const OP_SET_ANALOG_INPUT_THRESHOLD_POLARITY: u8 = b'p';
pub const OP_SET_ANALOG_INPUT_THRESHOLD_MODE: u8 = b'm';
pub const OP_ENABLE_ANALOG_INPUT_THRESHOLD: u8 = b'e';

// Device -> host response codes
pub const RSP_HANDSHAKE_OK: u8 = b'5';
pub const RSP_DISCONNECT_OK: u8 = 1;
pub const RSP_RESET_CLOCK_OK: u8 = 1;
pub const RSP_ENABLE_PORTS_OK: u8 = 1;
pub const RSP_SYNC_CHANNEL_MODE_OK: u8 = 1;
pub const RSP_STATE_MACHINE_INSTALLATION_OK: u8 = 1;
pub const RSP_LOAD_SERIAL_MESSAGE_OK: u8 = 1;
pub const RSP_RESET_SERIAL_MESSAGES_OK: u8 = 1;
pub const RSP_SET_FLEX_CHANNEL_TYPES_OK: u8 = 1;
pub const RSP_SET_ANALOG_INPUT_SAMPLING_INTERVAL_OK: u8 = 1;
pub const RSP_SET_ANALOG_INPUT_THRESHOLDS_OK: u8 = 1;
pub const RSP_SET_ANALOG_INPUT_THRESHOLD_POLARITY_OK: u8 = 1;
pub const RSP_SET_ANALOG_INPUT_THRESHOLD_MODE_OK: u8 = 1;
pub const RSP_ENABLE_ANALOG_INPUT_THRESHOLD_OK: u8 = 1;

// Port identification (multi-port hardware, machine type 4)
pub const PRIMARY_PORT_BEACON: u8 = 0xDE; // 222, sent every 100ms
pub const RSP_SECONDARY_PORT_HANDSHAKE_OK: u8 = 0xDE; // 222
pub const RSP_ANALOG_PORT_HANDSHAKE_OK: u8 = 0xDF; // 223

// Channel type codes from the hardware description
pub const INPUT_TYPE_BNC: char = 'B';
pub const INPUT_TYPE_WIRE: char = 'W';
pub const INPUT_TYPE_PORT: char = 'P';
pub const INPUT_TYPE_FLEX: char = 'F';
pub const INPUT_TYPE_UART: char = 'U';
pub const INPUT_TYPE_USB: char = 'X';

pub const OUTPUT_TYPE_BNC: char = 'B';
pub const OUTPUT_TYPE_WIRE: char = 'W';
pub const OUTPUT_TYPE_PWM: char = 'P';
pub const OUTPUT_TYPE_VALVE: char = 'V';
pub const OUTPUT_TYPE_FLEX: char = 'F';
pub const OUTPUT_TYPE_UART: char = 'U';
pub const OUTPUT_TYPE_SOFTCODE: char = 'X';

/// Output channel name that routes overrides to a hardware serial channel.
pub const SERIAL_OUTPUT_NAME: &str = "Serial";
