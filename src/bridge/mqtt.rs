//! # MQTT Publisher
//!
//! Connects the bridge to an MQTT broker with `rumqttc`. The `AsyncClient`
//! half queues requests; the `EventLoop` half owns the connection and only
//! makes progress while it is polled. `drive_event_loop` polls it on its own
//! task, subscribes to the device's topics after every (re)connect and
//! forwards incoming messages to the polling loop through a channel.
//!
//! The broker publishes the device's last will (availability `offline`) when
//! the bridge disappears without saying goodbye.

use crate::bridge::device::Device;
use crate::bridge::publisher::{Incoming, Message, Publisher, QoS};
use crate::config::BrokerConfig;
use crate::error::SmlError;
use async_trait::async_trait;
use log::{debug, info, warn};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Requests queued between the client and the event loop
const REQUEST_CAPACITY: usize = 64;

/// Pause before the event loop reconnects after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        }
    }
}

/// Publishes through a `rumqttc` client.
///
/// Publishing never waits for the broker: while the connection is down the
/// request queue fills up, and once it is full publishes fail with
/// `PublishError` instead of stalling the polling loop.
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        MqttPublisher { client }
    }

    /// Handle for the event loop task, which subscribes after connecting
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&mut self, message: &Message) -> Result<(), SmlError> {
        self.client
            .try_publish(
                message.topic.clone(),
                message.qos.into(),
                message.retain,
                message.payload.clone().into_bytes(),
            )
            .map_err(|e| SmlError::PublishError(format!("{}: {e}", message.topic)))?;

        debug!("queued {} ({} bytes)", message.topic, message.payload.len());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SmlError> {
        self.client
            .try_disconnect()
            .map_err(|e| SmlError::PublishError(e.to_string()))
    }
}

/// Connection options: broker address, client id, keep alive, credentials
/// and the last will.
pub fn mqtt_options(broker: &BrokerConfig, last_will: &Message) -> MqttOptions {
    let mut options = MqttOptions::new(&broker.client_id, &broker.host, broker.port);
    options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));

    if let Some(username) = &broker.username {
        options.set_credentials(username, broker.password.clone().unwrap_or_default());
    }

    options.set_last_will(LastWill::new(
        &last_will.topic,
        last_will.payload.as_bytes(),
        last_will.qos.into(),
        last_will.retain,
    ));
    options
}

/// Creates the publisher and the event loop for `device`. Nothing is sent
/// until the event loop is polled.
pub fn connect_broker(broker: &BrokerConfig, device: &Device) -> (MqttPublisher, EventLoop) {
    let options = mqtt_options(broker, &device.last_will());
    let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);

    info!(
        "MQTT broker {}:{} as '{}'",
        broker.host, broker.port, broker.client_id
    );
    (MqttPublisher::new(client), eventloop)
}

/// Polls the connection until the client disconnects or nobody listens for
/// incoming messages any more. Connection errors are retried forever.
pub async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Vec<String>,
    incoming: mpsc::Sender<Incoming>,
) {
    loop {
        match eventloop.poll().await {
            Ok(event) => {
                if !handle_event(event, &client, &subscriptions, &incoming) {
                    break;
                }
            }
            Err(e) => {
                warn!("MQTT connection error: {e}, retrying in {RECONNECT_DELAY:?}");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
    debug!("MQTT event loop stopped");
}

/// Reacts to one event of the connection. Returns false once the event loop
/// should stop.
///
/// Nothing here waits: the caller is the task that drains the request queue.
pub fn handle_event(
    event: Event,
    client: &AsyncClient,
    subscriptions: &[String],
    incoming: &mpsc::Sender<Incoming>,
) -> bool {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            if ack.code != ConnectReturnCode::Success {
                warn!("Broker refused connection: {:?}", ack.code);
                return true;
            }
            info!("Connected to broker, subscribing to {} topics", subscriptions.len());
            for topic in subscriptions {
                if let Err(e) = client.try_subscribe(topic, rumqttc::QoS::AtLeastOnce) {
                    warn!("Cannot subscribe to {topic}: {e}");
                }
            }
            true
        }
        Event::Incoming(Packet::Publish(publish)) => {
            let message = Incoming {
                topic: publish.topic,
                payload: String::from_utf8_lossy(&publish.payload).into_owned(),
            };
            match incoming.try_send(message) {
                Ok(()) => true,
                Err(TrySendError::Full(message)) => {
                    warn!("Dropping message on {}: inbound queue full", message.topic);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        }
        Event::Outgoing(Outgoing::Disconnect) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, Publish, Request};

    fn test_client() -> (AsyncClient, flume::Receiver<Request>) {
        let (tx, rx) = flume::bounded(16);
        (AsyncClient::from_senders(tx), rx)
    }

    fn broker() -> BrokerConfig {
        BrokerConfig {
            host: "broker.local".into(),
            port: 1884,
            client_id: "meter-bridge".into(),
            username: Some("meter".into()),
            password: Some("secret".into()),
            keep_alive_secs: 30,
        }
    }

    #[tokio::test]
    async fn test_publish_maps_message() {
        let (client, rx) = test_client();
        let mut publisher = MqttPublisher::new(client);

        publisher
            .publish(&Message::new("a/b", "online", QoS::AtLeastOnce, true))
            .await
            .unwrap();

        let Ok(Request::Publish(publish)) = rx.try_recv() else {
            panic!("expected a publish request");
        };
        assert_eq!(publish.topic, "a/b");
        assert_eq!(&publish.payload[..], b"online");
        assert_eq!(publish.qos, rumqttc::QoS::AtLeastOnce);
        assert!(publish.retain);
    }

    #[tokio::test]
    async fn test_full_queue_is_a_publish_error() {
        let (tx, _rx) = flume::bounded(1);
        let mut publisher = MqttPublisher::new(AsyncClient::from_senders(tx));
        let message = Message::new("a/b", "1", QoS::AtMostOnce, false);

        publisher.publish(&message).await.unwrap();
        let err = publisher.publish(&message).await.unwrap_err();
        assert!(matches!(err, SmlError::PublishError(_)));
    }

    #[tokio::test]
    async fn test_close_disconnects() {
        let (client, rx) = test_client();
        let mut publisher = MqttPublisher::new(client);

        publisher.close().await.unwrap();
        assert!(matches!(rx.try_recv(), Ok(Request::Disconnect(_))));
    }

    #[test]
    fn test_options() {
        let will = Message::new("homeassistant/sensor/meter/availability", "offline", QoS::AtLeastOnce, true);
        let options = mqtt_options(&broker(), &will);

        assert_eq!(options.broker_address(), ("broker.local".to_string(), 1884));
        assert_eq!(options.client_id(), "meter-bridge");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));

        let last_will = options.last_will().unwrap();
        assert_eq!(last_will.topic, "homeassistant/sensor/meter/availability");
        assert_eq!(&last_will.message[..], b"offline");
        assert!(last_will.retain);
    }

    #[test]
    fn test_connack_subscribes() {
        let (client, rx) = test_client();
        let (tx, _inbound) = mpsc::channel(4);
        let topics = vec!["hass/status".to_string(), "homeassistant/sensor/meter/command".to_string()];

        let ack = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
        assert!(handle_event(ack, &client, &topics, &tx));

        let subscribed: Vec<String> = rx
            .try_iter()
            .filter_map(|request| match request {
                Request::Subscribe(sub) => Some(sub.filters[0].path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(subscribed, topics);
    }

    #[test]
    fn test_refused_connection_does_not_subscribe() {
        let (client, rx) = test_client();
        let (tx, _inbound) = mpsc::channel(4);

        let ack = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::NotAuthorized,
            false,
        )));
        assert!(handle_event(ack, &client, &["hass/status".to_string()], &tx));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_incoming_publish_is_forwarded() {
        let (client, _rx) = test_client();
        let (tx, mut inbound) = mpsc::channel(4);

        let event = Event::Incoming(Packet::Publish(Publish::new(
            "hass/status",
            rumqttc::QoS::AtLeastOnce,
            "online",
        )));
        assert!(handle_event(event, &client, &[], &tx));
        assert_eq!(
            inbound.try_recv().unwrap(),
            Incoming {
                topic: "hass/status".into(),
                payload: "online".into()
            }
        );

        drop(inbound);
        let event = Event::Incoming(Packet::Publish(Publish::new(
            "hass/status",
            rumqttc::QoS::AtLeastOnce,
            "online",
        )));
        assert!(!handle_event(event, &client, &[], &tx));
    }

    #[test]
    fn test_disconnect_stops_event_loop() {
        let (client, _rx) = test_client();
        let (tx, _inbound) = mpsc::channel(4);
        assert!(!handle_event(Event::Outgoing(Outgoing::Disconnect), &client, &[], &tx));
    }
}
