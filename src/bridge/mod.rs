//! The bridge module presents meter readings to the home-automation bus:
//! topic layout and discovery payloads (`device`), the publish seam
//! (`publisher`), the MQTT connection (`mqtt`) and the polling loop that ties
//! reading and publishing together (`run`).

pub mod device;
pub mod mqtt;
pub mod publisher;
pub mod run;

pub use device::{Device, EntityValue, Inbound, BUS_STATUS_TOPIC};
pub use mqtt::{connect_broker, drive_event_loop, MqttPublisher};
pub use publisher::{Incoming, JsonLinesPublisher, LogPublisher, Message, Publisher, QoS};
pub use run::{until_signal, PollOutcome, Poller};
