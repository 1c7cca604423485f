//! # Polling Loop
//!
//! Wires the pieces together: read a message, let the tracker decide whether
//! it is worth publishing, hand the resulting state to the publisher, sleep.
//! Everything runs sequentially on one task. Messages from the bus and
//! shutdown are only observed while sleeping, so a read in progress always
//! finishes (or times out) first.

use crate::bridge::device::{Device, Inbound};
use crate::bridge::publisher::{Incoming, Publisher};
use crate::error::SmlError;
use crate::sml::reader::FrameReader;
use crate::sml::transport::SerialTransport;
use crate::tracker::{MeterStateTracker, Snapshot};
use crate::util::logging::LogThrottle;
use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;

/// Framing warnings allowed per window
const READ_WARNINGS_PER_WINDOW: u32 = 5;
const READ_WARNING_WINDOW_MS: u64 = 10 * 60 * 1000;

/// Result of one poll cycle
#[derive(Debug)]
pub enum PollOutcome {
    /// A snapshot was emitted and its state published
    Published(Snapshot),
    /// All values decoded, nothing worth publishing
    Unchanged,
    /// A configured offset did not decode; the message was dropped
    Incomplete,
    /// No message could be read this cycle
    Skipped(SmlError),
}

pub struct Poller<T, P> {
    reader: FrameReader<T>,
    tracker: MeterStateTracker,
    device: Device,
    publisher: P,
    poll_interval: Duration,
    throttle: LogThrottle,
}

impl<T: SerialTransport, P: Publisher> Poller<T, P> {
    pub fn new(
        reader: FrameReader<T>,
        tracker: MeterStateTracker,
        device: Device,
        publisher: P,
        poll_interval: Duration,
    ) -> Self {
        Poller {
            reader,
            tracker,
            device,
            publisher,
            poll_interval,
            throttle: LogThrottle::new(READ_WARNING_WINDOW_MS, READ_WARNINGS_PER_WINDOW),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn tracker(&self) -> &MeterStateTracker {
        &self.tracker
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }

    /// Publishes discovery, availability and the setup command.
    pub async fn startup(&mut self) -> Result<(), SmlError> {
        let messages = self.device.connect_messages();
        for message in &messages {
            info!("publish config topic={} payload={}", message.topic, message.payload);
        }
        self.publisher.publish_all(&messages).await
    }

    /// Marks the device offline.
    pub async fn shutdown(&mut self) -> Result<(), SmlError> {
        info!("Marking {} offline", self.device.name());
        self.publisher
            .publish_all(&self.device.disconnect_messages())
            .await
    }

    /// One read-decide-publish cycle. Read failures are reported as
    /// `Skipped`; only publish failures are errors.
    pub async fn poll_once(&mut self) -> Result<PollOutcome, SmlError> {
        let message = match self.reader.read_message().await {
            Ok(message) => message,
            Err(e) => {
                if self.throttle.allow() {
                    warn!("Skipping read cycle: {e}");
                }
                return Ok(PollOutcome::Skipped(e));
            }
        };

        let incomplete_before = self.tracker.incomplete_messages();
        let Some(snapshot) = self.tracker.update(&message) else {
            let outcome = if self.tracker.incomplete_messages() > incomplete_before {
                PollOutcome::Incomplete
            } else {
                PollOutcome::Unchanged
            };
            debug!("No update published: {outcome:?}");
            return Ok(outcome);
        };

        self.device.set_states(&snapshot);
        self.publisher
            .publish_all(&self.device.state_messages())
            .await?;
        Ok(PollOutcome::Published(snapshot))
    }

    /// Reacts to a message received from the bus. A restarted bus gets
    /// discovery again; commands are recorded as the entity's value.
    pub async fn handle_inbound(&mut self, topic: &str, payload: &str) -> Result<Inbound, SmlError> {
        let inbound = self.device.handle_message(topic, payload);
        match &inbound {
            Inbound::Reconfigure => {
                debug!("Bus is back online, republishing discovery");
                self.startup().await?;
            }
            Inbound::Command { entity, value } => {
                info!("Command for {entity}: {value}");
                self.device.set_value(entity, value.clone());
            }
            Inbound::Ignored => {}
        }
        Ok(inbound)
    }

    /// Polls until `shutdown` resolves, then marks the device offline.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<(), SmlError>
    where
        F: Future<Output = ()>,
    {
        let (_no_messages, inbound) = mpsc::channel(1);
        self.run_with_inbound(shutdown, inbound).await
    }

    /// Like `run`, also handling bus messages from `inbound` between polls.
    /// The publisher is closed on the way out.
    pub async fn run_with_inbound<F>(
        &mut self,
        shutdown: F,
        mut inbound: mpsc::Receiver<Incoming>,
    ) -> Result<(), SmlError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.startup().await?;

        'polling: loop {
            if let Err(e) = self.poll_once().await {
                error!("Publishing failed: {e}");
            }

            let pause = tokio::time::sleep(self.poll_interval);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    _ = &mut shutdown => break 'polling,
                    _ = &mut pause => break,
                    Some(message) = inbound.recv() => {
                        if let Err(e) = self.handle_inbound(&message.topic, &message.payload).await {
                            error!("Handling message on {} failed: {e}", message.topic);
                        }
                    }
                }
            }
        }

        info!(
            "Stopping after {} messages ({} read warnings suppressed)",
            self.reader.messages_read(),
            self.throttle.suppressed()
        );
        self.shutdown().await?;
        self.publisher.close().await
    }
}

/// Resolves once `signal` fires. If the signal cannot be listened for, this
/// never resolves and the bridge runs until it is killed.
pub async fn until_signal<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Cannot listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
