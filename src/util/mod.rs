//! # Utility Modules
//!
//! Hex helpers for frame dumps and log throttling for repeated read failures.

pub mod hex;
pub mod logging;

pub use hex::{decode_hex, format_hex_compact, hex_to_bytes, pretty_hex, HexError};
pub use logging::LogThrottle;
