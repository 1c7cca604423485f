//! Mock serial port implementation for testing
//!
//! This module provides an in-memory serial line that can be used to test the
//! frame reader and the polling loop without an optical read head attached.
//! Once the queued bytes are used up the mock reports end of stream.

use crate::constants::{SML_END, SML_ESCAPE, SML_START};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Mock serial port delivering queued bytes
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated error returned by the next read
    pub next_error: Arc<Mutex<Option<io::Error>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        let mut rx = self.rx_buffer.lock().unwrap();
        rx.extend(data);
    }

    /// Queue a complete SML transport frame around `payload`
    pub fn queue_frame(&self, payload: &[u8]) {
        self.queue_rx_data(&build_transport_frame(payload));
    }

    /// Number of bytes not yet read
    pub fn pending(&self) -> usize {
        self.rx_buffer.lock().unwrap().len()
    }

    /// Clear all queued data
    pub fn clear(&self) {
        self.rx_buffer.lock().unwrap().clear();
    }

    /// Set an error to be returned on the next read
    pub fn set_next_error(&self, error: io::Error) {
        *self.next_error.lock().unwrap() = Some(error);
    }
}

/// Builds the byte sequence a meter sends for one message:
/// escape, start marker, payload, escape, end marker, fill count and a
/// two-byte checksum. The checksum bytes are placeholders, since the reader
/// does not verify them.
pub fn build_transport_frame(payload: &[u8]) -> Vec<u8> {
    let fill = (4 - payload.len() % 4) % 4;

    let mut frame = Vec::with_capacity(payload.len() + fill + 16);
    frame.extend_from_slice(&SML_ESCAPE);
    frame.extend_from_slice(&SML_START);
    frame.extend_from_slice(payload);
    frame.extend(std::iter::repeat(0x00).take(fill));
    frame.extend_from_slice(&SML_ESCAPE);
    frame.push(SML_END);
    frame.push(fill as u8);
    frame.extend_from_slice(&[0xC0, 0xDE]);
    frame
}

impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.next_error.lock().unwrap().take() {
            return Poll::Ready(Err(error));
        }

        let mut rx = self.rx_buffer.lock().unwrap();
        let available = rx.len().min(buf.remaining());

        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
        }

        Poll::Ready(Ok(()))
    }
}
