//! The sml module contains the SML side of the bridge: the serial transport,
//! the frame reader that cuts the byte stream into messages and the decoder
//! for integer fields at fixed offsets.

pub mod field;
pub mod reader;
pub mod serial_mock;
pub mod transport;

pub use field::{decode_field, parse_integer, scan_fields, ScanRecord};
pub use reader::{FrameReader, RawMessage};
pub use transport::{open_serial, SerialConfig, SerialTransport, TimedReader};
