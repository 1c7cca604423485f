//! # SML Frame Reader
//!
//! Turns the continuous byte stream of the optical read head into discrete SML
//! messages. A message on the wire looks like
//!
//! ```text
//! 1B 1B 1B 1B  01 01 01 01  <message bytes>  1B 1B 1B 1B  1A <fill> <crc16>
//! ```
//!
//! The escape sequence appears on both ends, so the first escape seen after
//! connecting (or after a glitch) may just as well close a message whose start
//! was missed. The reader therefore inspects up to `SML_MAX_RESYNC_ATTEMPTS`
//! escape-delimited segments and only accepts one that begins with the start
//! marker. Fill count and checksum are not validated.

use crate::constants::{
    SML_END, SML_END_TRAILER_LEN, SML_ESCAPE, SML_MAX_RESYNC_ATTEMPTS, SML_START,
};
use crate::error::SmlError;
use crate::sml::transport::SerialTransport;
use crate::util::hex::format_hex_compact;
use bytes::Bytes;
use log::{debug, log_enabled, trace, Level};
use std::ops::Deref;

/// One complete SML message: the bytes between the start marker and the
/// closing escape sequence, fill bytes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage(Bytes);

impl RawMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

}

impl Deref for RawMessage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for RawMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(data: Vec<u8>) -> Self {
        RawMessage(Bytes::from(data))
    }
}

impl From<&[u8]> for RawMessage {
    fn from(data: &[u8]) -> Self {
        RawMessage(Bytes::copy_from_slice(data))
    }
}

/// Reads SML messages from a serial transport it owns exclusively.
pub struct FrameReader<T> {
    transport: T,
    messages_read: u64,
}

impl<T: SerialTransport> FrameReader<T> {
    pub fn new(transport: T) -> Self {
        FrameReader {
            transport,
            messages_read: 0,
        }
    }

    /// Number of messages successfully read so far
    pub fn messages_read(&self) -> u64 {
        self.messages_read
    }

    /// Gives the transport back, closing nothing.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Reads the next complete message from the stream.
    ///
    /// Every failure leaves the stream at an arbitrary position; the next call
    /// resynchronizes on its own.
    pub async fn read_message(&mut self) -> Result<RawMessage, SmlError> {
        let lead = self.transport.read_until(&SML_ESCAPE).await?;
        if !lead.ends_with(&SML_ESCAPE) {
            debug!("No escape sequence in {} bytes", lead.len());
            return Err(SmlError::EscapeNotFound);
        }

        let body = self.read_body().await?;

        let trailer = self.transport.read(SML_END_TRAILER_LEN).await?;
        if trailer.first() != Some(&SML_END) {
            debug!("Expected end marker, got [{}]", format_hex_compact(&trailer));
            return Err(SmlError::EndNotFound);
        }

        self.messages_read += 1;
        if log_enabled!(Level::Trace) {
            trace!("SML message ({} bytes): {}", body.len(), format_hex_compact(&body));
        }

        Ok(RawMessage::from(body))
    }

    /// Reads escape-delimited segments until one starts with the start marker
    /// and returns it without the start marker and the closing escape.
    async fn read_body(&mut self) -> Result<Vec<u8>, SmlError> {
        for attempt in 1..=SML_MAX_RESYNC_ATTEMPTS {
            let segment = self.transport.read_until(&SML_ESCAPE).await?;

            if segment.starts_with(&SML_START) {
                // cut short by a timeout or the end of the stream
                let Some(body) = segment.strip_suffix(SML_ESCAPE.as_slice()) else {
                    debug!("Message body without closing escape ({} bytes)", segment.len());
                    return Err(SmlError::EndNotFound);
                };
                return Ok(body[SML_START.len()..].to_vec());
            }

            debug!(
                "Segment {attempt}/{SML_MAX_RESYNC_ATTEMPTS} without start marker ({} bytes), resyncing",
                segment.len()
            );
        }

        Err(SmlError::StartNotFound)
    }
}
