//! # Publisher
//!
//! The seam between the bridge and whatever carries messages to the bus. The
//! bridge only produces `Message`s; a `Publisher` delivers them.
//!
//! Publishers shipped with the crate:
//! - `MqttPublisher` (in `bridge::mqtt`) sends to an MQTT broker.
//! - `JsonLinesPublisher` writes every message as one JSON object per line,
//!   so the output can be piped into another tool.
//! - `LogPublisher` only logs what would be published.

use crate::error::SmlError;
use async_trait::async_trait;
use log::{debug, info};
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Delivery guarantee requested for a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum QoS {
    AtMostOnce,
    AtLeastOnce,
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> u8 {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
        }
    }
}

/// One message for the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub retain: bool,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>, qos: QoS, retain: bool) -> Self {
        Message {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            retain,
        }
    }
}

/// A message received from the bus on one of the device's subscriptions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incoming {
    pub topic: String,
    pub payload: String,
}

#[async_trait]
pub trait Publisher: Send {
    async fn publish(&mut self, message: &Message) -> Result<(), SmlError>;

    /// Flushes pending messages and releases the connection. Called once,
    /// after the final messages of a run.
    async fn close(&mut self) -> Result<(), SmlError> {
        Ok(())
    }

    /// Publishes `messages` in order, stopping at the first failure.
    async fn publish_all(&mut self, messages: &[Message]) -> Result<(), SmlError> {
        for message in messages {
            self.publish(message).await?;
        }
        Ok(())
    }
}

/// Logs messages instead of sending them anywhere.
#[derive(Debug, Default)]
pub struct LogPublisher {
    published: usize,
}

impl LogPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> usize {
        self.published
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&mut self, message: &Message) -> Result<(), SmlError> {
        self.published += 1;
        info!(
            "publish topic={} retain={} payload={}",
            message.topic, message.retain, message.payload
        );
        Ok(())
    }
}

/// Writes each message as a JSON line to `W`.
pub struct JsonLinesPublisher<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        JsonLinesPublisher { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesPublisher<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Publisher for JsonLinesPublisher<W> {
    async fn publish(&mut self, message: &Message) -> Result<(), SmlError> {
        let mut line =
            serde_json::to_vec(message).map_err(|e| SmlError::PublishError(e.to_string()))?;
        line.push(b'\n');

        self.writer
            .write_all(&line)
            .await
            .map_err(|e| SmlError::PublishError(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| SmlError::PublishError(e.to_string()))?;

        debug!("published {} ({} bytes)", message.topic, message.payload.len());
        Ok(())
    }
}
