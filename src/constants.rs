//! SML Transport Constants
//!
//! Byte patterns of the SML transport layer and the tag nibbles of the two
//! integer field types the decoder understands.

/// Escape sequence. Precedes the start marker and precedes the end marker,
/// so on its own it cannot tell an opening escape from a closing one.
pub const SML_ESCAPE: [u8; 4] = [0x1B, 0x1B, 0x1B, 0x1B];

/// Start marker, directly after the escape sequence that opens a message
pub const SML_START: [u8; 4] = [0x01, 0x01, 0x01, 0x01];

/// End marker, first byte after the escape sequence that closes a message
pub const SML_END: u8 = 0x1A;

/// Bytes following the closing escape: end marker, fill count, CRC16
pub const SML_END_TRAILER_LEN: usize = 4;

/// Maximum number of escape-delimited segments inspected while looking for
/// the start marker before giving up on a read cycle
pub const SML_MAX_RESYNC_ATTEMPTS: usize = 5;

// ----------------------------------------------------------------------------
// Field tag byte
// ----------------------------------------------------------------------------

/// Tag byte mask for the value type
pub const SML_TAG_TYPE_MASK: u8 = 0xF0;

/// Tag byte mask for the field size (tag byte included)
pub const SML_TAG_SIZE_MASK: u8 = 0x0F;

/// Type nibble of a signed integer field
pub const SML_TYPE_SIGNED: u8 = 0x50;

/// Type nibble of an unsigned integer field
pub const SML_TYPE_UNSIGNED: u8 = 0x60;

/// A field needs at least the tag byte and one more byte in the buffer
pub const SML_MIN_FIELD_LEN: usize = 2;

// ----------------------------------------------------------------------------
// Runtime defaults
// ----------------------------------------------------------------------------

/// Default serial device of an IR read head on a Raspberry Pi UART
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyAMA0";

/// SML meters push their telegrams at 9600 baud, 8N1
pub const DEFAULT_BAUDRATE: u32 = 9600;

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 5000;

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Heartbeat: longest time between two published snapshots
pub const DEFAULT_MAX_INTERVAL_SECS: u64 = 3600;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

pub const DEFAULT_MQTT_CLIENT_ID: &str = "sml-bridge";

pub const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 60;

/// Highest offset (exclusive) probed by the offset scan
pub const DEFAULT_SCAN_MAX_OFFSET: usize = 300;
