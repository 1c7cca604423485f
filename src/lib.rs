//! # sml-bridge - Smart Meter (SML) to Home-Automation Bus Bridge
//!
//! The sml-bridge crate reads the SML telegrams an electricity meter pushes
//! over its optical interface, extracts the configured integer readings and
//! publishes them as discoverable entities on a home-automation bus.
//!
//! ## Features
//!
//! - Cut the continuous serial byte stream into SML messages, resynchronizing
//!   after partial or garbled frames
//! - Decode signed and unsigned integer fields at configured byte offsets
//! - Publish only when a reading changes, plus a heartbeat for stable meters
//! - Build discovery, availability and state messages and publish them to an
//!   MQTT broker, reacting to commands and bus restarts
//! - Scan messages for integer fields to find the offsets of a new meter
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use sml_bridge::{decode_field, EntityDescriptor, MeterStateTracker};
//!
//! let message = [0x65, 0x00, 0x00, 0x03, 0xE8];
//! assert_eq!(decode_field(&message, 0), Some(1000));
//!
//! let mut tracker = MeterStateTracker::new(
//!     vec![EntityDescriptor::new("energy_import", 0)],
//!     Duration::from_secs(3600),
//! );
//! let snapshot = tracker.update(&message).unwrap();
//! assert_eq!(snapshot.get("energy_import"), Some(1000));
//! assert!(tracker.update(&message).is_none());
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod scan;
pub mod sml;
pub mod tracker;
pub mod util;

pub use crate::error::SmlError;
pub use crate::logging::{init_logger, log_info};

pub use bridge::{
    Device, JsonLinesPublisher, LogPublisher, Message, MqttPublisher, PollOutcome, Poller, Publisher,
};
pub use config::Config;
pub use sml::{decode_field, open_serial, FrameReader, RawMessage, SerialConfig, SerialTransport};
pub use tracker::{EntityDescriptor, MeterStateTracker, Snapshot};

/// Opens the serial port and returns a frame reader that owns it.
///
/// # Arguments
/// * `config` - Port name, baud rate and read timeout
///
/// # Returns
/// * `Ok(FrameReader)` - Reader for SML messages
/// * `Err(SmlError)` - The port could not be opened
pub fn connect(
    config: &SerialConfig,
) -> Result<FrameReader<sml::TimedReader<tokio_serial::SerialStream>>, SmlError> {
    Ok(FrameReader::new(open_serial(config)?))
}
