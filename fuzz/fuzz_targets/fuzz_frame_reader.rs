#![no_main]

use libfuzzer_sys::fuzz_target;
use sml_bridge::sml::serial_mock::MockSerialPort;
use sml_bridge::sml::{FrameReader, TimedReader};
use sml_bridge::SmlError;
use std::time::Duration;

fuzz_target!(|data: &[u8]| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    runtime.block_on(async {
        let mock = MockSerialPort::new();
        mock.queue_rx_data(data);
        let mut reader = FrameReader::new(TimedReader::new(mock, Duration::from_millis(1)));

        // Each call consumes at least one byte until the stream is exhausted
        for _ in 0..=data.len() {
            match reader.read_message().await {
                Ok(message) => assert!(message.len() <= data.len()),
                Err(SmlError::EscapeNotFound) => break,
                Err(_) => {}
            }
        }
    });
});
