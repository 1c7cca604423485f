//! The MQTT publisher driven by the polling loop, with the broker side
//! replaced by the client's request queue.

use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, Event, Outgoing, Packet, Publish, Request,
};
use sml_bridge::bridge::mqtt::handle_event;
use sml_bridge::bridge::{Device, MqttPublisher, Poller};
use sml_bridge::config::Config;
use sml_bridge::sml::serial_mock::MockSerialPort;
use sml_bridge::sml::{FrameReader, TimedReader};
use sml_bridge::MeterStateTracker;
use std::time::Duration;
use tokio::sync::mpsc;

const CONFIG: &str = r#"
publisher: mqtt
broker:
  host: localhost
device:
  name: meter
entities:
  energy:
    offset: 0
    name: Energy
  power:
    offset: 5
    name: Power
"#;

fn poller(
    config: &Config,
    client: AsyncClient,
) -> Poller<TimedReader<MockSerialPort>, MqttPublisher> {
    Poller::new(
        FrameReader::new(TimedReader::new(MockSerialPort::new(), Duration::from_millis(20))),
        MeterStateTracker::new(config.entity_descriptors(), config.max_interval()),
        Device::new(&config.device, &config.entities),
        MqttPublisher::new(client),
        Duration::from_secs(1),
    )
}

fn published(requests: &[Request]) -> Vec<(String, String)> {
    requests
        .iter()
        .filter_map(|request| match request {
            Request::Publish(p) => Some((
                p.topic.clone(),
                String::from_utf8_lossy(&p.payload).into_owned(),
            )),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_bus_restart_republishes_discovery() {
    let config = Config::from_yaml_str(CONFIG).unwrap();
    let device = Device::new(&config.device, &config.entities);
    let (request_tx, requests) = flume::bounded(64);
    let client = AsyncClient::from_senders(request_tx);
    let (inbound_tx, inbound_rx) = mpsc::channel(4);

    let ack = Event::Incoming(Packet::ConnAck(ConnAck::new(ConnectReturnCode::Success, false)));
    assert!(handle_event(ack, &client, &device.subscriptions(), &inbound_tx));

    let online = Event::Incoming(Packet::Publish(Publish::new(
        "hass/status",
        rumqttc::QoS::AtLeastOnce,
        "online",
    )));
    assert!(handle_event(online, &client, &device.subscriptions(), &inbound_tx));

    let mut p = poller(&config, client.clone());
    p.run_with_inbound(tokio::time::sleep(Duration::from_millis(100)), inbound_rx)
        .await
        .unwrap();

    let requests: Vec<Request> = requests.try_iter().collect();
    let subscribed: Vec<String> = requests
        .iter()
        .filter_map(|request| match request {
            Request::Subscribe(sub) => Some(sub.filters[0].path.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(subscribed, device.subscriptions());

    let messages = published(&requests);
    let discovery: Vec<&str> = messages
        .iter()
        .map(|(topic, _)| topic.as_str())
        .filter(|topic| topic.ends_with("/config"))
        .collect();
    assert_eq!(
        discovery,
        vec![
            "homeassistant/sensor/meter/energy/config",
            "homeassistant/sensor/meter/power/config",
            "homeassistant/sensor/meter/energy/config",
            "homeassistant/sensor/meter/power/config",
        ]
    );

    assert_eq!(
        messages.last().unwrap(),
        &(
            "homeassistant/sensor/meter/availability".to_string(),
            "offline".to_string()
        )
    );
    assert!(matches!(requests.last(), Some(Request::Disconnect(_))));

    // the queued disconnect ends the event loop once it goes out
    assert!(!handle_event(
        Event::Outgoing(Outgoing::Disconnect),
        &client,
        &[],
        &inbound_tx
    ));
}

#[tokio::test]
async fn test_commands_reach_the_device() {
    let config = Config::from_yaml_str(CONFIG).unwrap();
    let (request_tx, _requests) = flume::bounded(64);
    let client = AsyncClient::from_senders(request_tx);
    let (inbound_tx, inbound_rx) = mpsc::channel(4);

    let command = Event::Incoming(Packet::Publish(Publish::new(
        "homeassistant/sensor/meter/power",
        rumqttc::QoS::AtLeastOnce,
        "1500",
    )));
    assert!(handle_event(command, &client, &[], &inbound_tx));

    let mut p = poller(&config, client);
    p.run_with_inbound(tokio::time::sleep(Duration::from_millis(100)), inbound_rx)
        .await
        .unwrap();

    assert_eq!(
        p.device().get_states()["power"],
        sml_bridge::bridge::EntityValue::Int(1500)
    );
}
