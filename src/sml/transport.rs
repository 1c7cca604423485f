//! # SML Serial Transport
//!
//! The frame reader only needs two operations from the serial link: read until
//! a delimiter and read a fixed number of bytes, both bounded by a timeout.
//! `SerialTransport` captures that contract. `TimedReader` implements it for
//! any tokio `AsyncRead`, which covers a real `tokio_serial::SerialStream` as
//! well as in-memory streams used in tests.
//!
//! Both operations behave like a serial port opened with a read timeout: when
//! the timeout expires or the stream ends, the bytes collected so far are
//! returned and it is up to the caller to notice that the delimiter or the
//! requested length is missing. Only genuine I/O faults become errors.

use crate::constants::{DEFAULT_BAUDRATE, DEFAULT_READ_TIMEOUT_MS, DEFAULT_SERIAL_PORT};
use crate::error::SmlError;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::time::{timeout_at, Instant};
use tokio_serial::SerialPortBuilderExt;

/// Configuration for the serial connection to the optical read head.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port: String,
    pub baudrate: u32,
    pub timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baudrate: DEFAULT_BAUDRATE,
            timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

/// Byte-oriented read operations the frame reader depends on.
#[async_trait]
pub trait SerialTransport: Send {
    /// Reads until `delimiter` has been read (inclusive), the timeout expires
    /// or the stream ends. Returns everything read.
    async fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>, SmlError>;

    /// Reads up to `n` bytes. Fewer are returned on timeout or end of stream.
    async fn read(&mut self, n: usize) -> Result<Vec<u8>, SmlError>;
}

/// `SerialTransport` over any async byte stream, with a per-call timeout.
pub struct TimedReader<R> {
    inner: BufReader<R>,
    timeout: Duration,
}

impl<R: AsyncRead + Unpin + Send> TimedReader<R> {
    pub fn new(inner: R, timeout: Duration) -> Self {
        TimedReader {
            inner: BufReader::new(inner),
            timeout,
        }
    }

    /// Reads a single byte before `deadline`. `None` means timeout or end of
    /// stream.
    async fn next_byte(&mut self, deadline: Instant) -> Result<Option<u8>, SmlError> {
        match timeout_at(deadline, self.inner.read_u8()).await {
            Err(_elapsed) => Ok(None),
            Ok(Ok(byte)) => Ok(Some(byte)),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Ok(Err(e)) => Err(SmlError::SerialPortError(e.to_string())),
        }
    }

    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> SerialTransport for TimedReader<R> {
    async fn read_until(&mut self, delimiter: &[u8]) -> Result<Vec<u8>, SmlError> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = Vec::new();

        while let Some(byte) = self.next_byte(deadline).await? {
            buf.push(byte);
            if !delimiter.is_empty() && buf.ends_with(delimiter) {
                break;
            }
        }

        Ok(buf)
    }

    async fn read(&mut self, n: usize) -> Result<Vec<u8>, SmlError> {
        let deadline = Instant::now() + self.timeout;
        let mut buf = Vec::with_capacity(n);

        while buf.len() < n {
            match self.next_byte(deadline).await? {
                Some(byte) => buf.push(byte),
                None => break,
            }
        }

        Ok(buf)
    }
}

/// Opens the serial port described by `config` (8 data bits, no parity, one
/// stop bit). The port stays open for as long as the returned reader lives.
pub fn open_serial(config: &SerialConfig) -> Result<TimedReader<tokio_serial::SerialStream>, SmlError> {
    let port = tokio_serial::new(&config.port, config.baudrate)
        .data_bits(tokio_serial::DataBits::Eight)
        .stop_bits(tokio_serial::StopBits::One)
        .parity(tokio_serial::Parity::None)
        .timeout(config.timeout)
        .open_native_async()
        .map_err(|e| SmlError::SerialPortError(format!("{}: {e}", config.port)))?;

    Ok(TimedReader::new(port, config.timeout))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sml::serial_mock::MockSerialPort;

    #[tokio::test]
    async fn test_read_until_includes_delimiter() {
        let mock = MockSerialPort::new();
        mock.queue_rx_data(&[0xAA, 0xBB, 0x1B, 0x1B, 0xCC]);
        let mut reader = TimedReader::new(mock.clone(), Duration::from_secs(1));

        let chunk = reader.read_until(&[0x1B, 0x1B]).await.unwrap();
        assert_eq!(chunk, vec![0xAA, 0xBB, 0x1B, 0x1B]);

        let rest = reader.read(4).await.unwrap();
        assert_eq!(rest, vec![0xCC]);
    }

    #[tokio::test]
    async fn test_read_until_end_of_stream_returns_partial() {
        let mock = MockSerialPort::new();
        mock.queue_rx_data(&[0x01, 0x02, 0x1B]);
        let mut reader = TimedReader::new(mock, Duration::from_secs(1));

        let chunk = reader.read_until(&[0x1B, 0x1B]).await.unwrap();
        assert_eq!(chunk, vec![0x01, 0x02, 0x1B]);
    }

    #[tokio::test]
    async fn test_read_exact_count() {
        let mock = MockSerialPort::new();
        mock.queue_rx_data(&[1, 2, 3, 4, 5, 6]);
        let mut reader = TimedReader::new(mock, Duration::from_secs(1));

        assert_eq!(reader.read(4).await.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(reader.read(4).await.unwrap(), vec![5, 6]);
        assert!(reader.read(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_times_out_on_silent_line() {
        let (_writer, silent) = tokio::io::duplex(64);
        let mut reader = TimedReader::new(silent, Duration::from_millis(50));

        let chunk = reader.read_until(&[0x1B]).await.unwrap();
        assert!(chunk.is_empty());
    }

    #[tokio::test]
    async fn test_io_error_is_surfaced() {
        let mock = MockSerialPort::new();
        mock.set_next_error(std::io::Error::new(ErrorKind::BrokenPipe, "unplugged"));
        let mut reader = TimedReader::new(mock, Duration::from_secs(1));

        let result = reader.read_until(&[0x1B]).await;
        assert!(matches!(result, Err(SmlError::SerialPortError(_))));
    }
}
