//! # SML Bridge Error Handling
//!
//! This module defines the SmlError enum, which represents the different error
//! types that can occur in the sml-bridge crate.
//!
//! Framing errors describe a single corrupted read cycle. They are never fatal:
//! the polling loop logs them and tries again on the next poll.

use thiserror::Error;

/// Represents the different error types that can occur in the bridge.
#[derive(Debug, Error)]
pub enum SmlError {
    /// Indicates an error reported by the serial transport (open, read, disconnect).
    #[error("Serial port error: {0}")]
    SerialPortError(String),

    /// The stream ended or timed out before any escape sequence was seen.
    #[error("Framing error: escape sequence not found")]
    EscapeNotFound,

    /// No segment after an escape sequence started with the start marker
    /// within the resync bound.
    #[error("Framing error: start marker not found")]
    StartNotFound,

    /// The closing escape sequence was not followed by the end marker.
    #[error("Framing error: end marker not found")]
    EndNotFound,

    /// Indicates an invalid or unreadable configuration file.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Indicates that a message could not be handed to the downstream bus.
    #[error("Publish error: {0}")]
    PublishError(String),

    /// A catch‑all error for uncategorized cases.
    #[error("Other error: {0}")]
    Other(String),
}

impl SmlError {
    /// Returns true for the three framing failures of a single read cycle.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            SmlError::EscapeNotFound | SmlError::StartNotFound | SmlError::EndNotFound
        )
    }
}
