//! # Hex Encoding/Decoding Utilities
//!
//! Hex helpers used for frame dumps in logs, the `read` command of the CLI and
//! for building test frames from hex strings.
//!
//! ## Usage
//!
//! ```rust
//! use sml_bridge::util::hex::{decode_hex, format_hex_compact};
//!
//! let frame = decode_hex("1b1b1b1b 01010101").unwrap();
//! assert_eq!(format_hex_compact(&frame), "1b 1b 1b 1b 01 01 01 01");
//! ```

use thiserror::Error;

/// Errors that can occur during hex operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("Odd number of hex characters: {0}")]
    OddLength(usize),

    #[error("Empty hex string")]
    EmptyString,

    #[error("Hex decoding error: {0}")]
    DecodeError(String),
}

/// Decode hex string to bytes. Whitespace is ignored.
pub fn decode_hex(hex_str: &str) -> Result<Vec<u8>, HexError> {
    let cleaned: String = hex_str.chars().filter(|c| !c.is_whitespace()).collect();

    if cleaned.is_empty() {
        return Err(HexError::EmptyString);
    }
    if cleaned.len() % 2 != 0 {
        return Err(HexError::OddLength(cleaned.len()));
    }

    hex::decode(&cleaned).map_err(|e| HexError::DecodeError(e.to_string()))
}

/// Format data as "1b 1b 1b 1b" for single-line log output.
pub fn format_hex_compact(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex dump with offsets, one line per `bytes_per_line` bytes.
///
/// Offsets are printed in decimal, since that is how entity offsets are
/// written in the configuration file.
pub fn pretty_hex(data: &[u8], bytes_per_line: usize) -> String {
    let width = bytes_per_line.max(1);

    data.chunks(width)
        .enumerate()
        .map(|(i, chunk)| format!("{:5}: {}", i * width, format_hex_compact(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Helper for creating test data from hex strings.
/// Panics on invalid hex (intended for test code only).
pub fn hex_to_bytes(hex: &str) -> Vec<u8> {
    decode_hex(hex).expect("Invalid hex in test data")
}
