//! # Bus Device
//!
//! Presents the meter to the home-automation side as one device with a set of
//! discoverable entities, following the discovery topic layout:
//!
//! | Purpose      | Topic                                        |
//! |--------------|----------------------------------------------|
//! | state        | `homeassistant/<type>/<device>/state`        |
//! | discovery    | `homeassistant/<type>/<device>/<entity>/config` |
//! | command      | `homeassistant/<type>/<device>/<entity>`     |
//! | availability | `homeassistant/sensor/<device>/availability` |
//!
//! `Device` only builds messages. Delivering them is the job of a `Publisher`.

use crate::bridge::publisher::{Message, QoS};
use crate::config::{DeviceConfig, EntityConfig, EntityKind};
use crate::tracker::Snapshot;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;

const TOPIC_PREFIX: &str = "homeassistant";

/// Topic on which the home-automation side announces that it (re)started
pub const BUS_STATUS_TOPIC: &str = "hass/status";

const ONLINE: &str = "online";
const OFFLINE: &str = "offline";
const SETUP: &str = "setup";

/// Current value of an entity
#[derive(Debug, Clone, PartialEq)]
pub enum EntityValue {
    Int(i128),
    Float(f64),
    Text(String),
}

impl EntityValue {
    /// Integer first, then float, otherwise the text as is.
    pub fn parse(text: &str) -> Self {
        if let Ok(v) = text.parse::<i128>() {
            EntityValue::Int(v)
        } else if let Ok(v) = text.parse::<f64>() {
            EntityValue::Float(v)
        } else {
            EntityValue::Text(text.to_string())
        }
    }
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityValue::Int(v) => write!(f, "{v}"),
            EntityValue::Float(v) => write!(f, "{v}"),
            EntityValue::Text(v) => f.write_str(v),
        }
    }
}

/// What an incoming bus message asks the bridge to do
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A command for one of the device's entities
    Command { entity: String, value: EntityValue },
    /// The bus came back online; discovery must be published again
    Reconfigure,
    Ignored,
}

#[derive(Debug, Clone)]
struct Entity {
    config: EntityConfig,
    value: EntityValue,
}

pub struct Device {
    name: String,
    model: String,
    manufacturer: String,
    entities: BTreeMap<String, Entity>,
}

impl Device {
    pub fn new(device: &DeviceConfig, entities: &BTreeMap<String, EntityConfig>) -> Self {
        let entities = entities
            .iter()
            .map(|(id, config)| {
                let entity = Entity {
                    config: config.clone(),
                    value: EntityValue::Int(0),
                };
                (id.clone(), entity)
            })
            .collect();

        Device {
            name: device.name.clone(),
            model: device.model.clone(),
            manufacturer: device.manufacturer.clone(),
            entities,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn availability_topic(&self) -> String {
        format!("{TOPIC_PREFIX}/sensor/{}/availability", self.name)
    }

    pub fn state_topic(&self, kind: EntityKind) -> String {
        format!("{TOPIC_PREFIX}/{}/{}/state", kind.as_str(), self.name)
    }

    pub fn config_topic(&self, kind: EntityKind, entity: &str) -> String {
        format!("{TOPIC_PREFIX}/{}/{}/{entity}/config", kind.as_str(), self.name)
    }

    pub fn command_topic(&self, kind: EntityKind, entity: &str) -> String {
        format!("{TOPIC_PREFIX}/{}/{}/{entity}", kind.as_str(), self.name)
    }

    /// Device-wide command topic; `setup` is published here after connecting
    pub fn device_command_topic(&self) -> String {
        format!("{TOPIC_PREFIX}/sensor/{}/command", self.name)
    }

    /// Sets the value of a known entity. Returns false for unknown ids.
    pub fn set_value(&mut self, entity: &str, value: EntityValue) -> bool {
        match self.entities.get_mut(entity) {
            Some(e) => {
                e.value = value;
                true
            }
            None => false,
        }
    }

    /// Copies a snapshot into the entity values. Ids the device does not know
    /// are ignored.
    pub fn set_states(&mut self, snapshot: &Snapshot) {
        for (id, value) in snapshot.iter() {
            self.set_value(id, EntityValue::Int(value));
        }
    }

    pub fn get_states(&self) -> BTreeMap<String, EntityValue> {
        self.entities
            .iter()
            .map(|(id, e)| (id.clone(), e.value.clone()))
            .collect()
    }

    /// One state message per entity type in use. Values are sent as strings.
    pub fn state_messages(&self) -> Vec<Message> {
        EntityKind::STATEFUL
            .iter()
            .filter_map(|&kind| {
                let states: Map<String, Value> = self
                    .entities
                    .iter()
                    .filter(|(_, e)| e.config.kind == kind)
                    .map(|(id, e)| (id.clone(), Value::String(e.value.to_string())))
                    .collect();

                if states.is_empty() {
                    return None;
                }
                Some(Message::new(
                    self.state_topic(kind),
                    Value::Object(states).to_string(),
                    QoS::AtLeastOnce,
                    false,
                ))
            })
            .collect()
    }

    /// Discovery message of one entity, `None` for unknown ids.
    pub fn config_message(&self, entity: &str) -> Option<Message> {
        let e = self.entities.get(entity)?;
        let cfg = &e.config;
        let mut payload = Map::new();

        let optional = [
            ("device_class", cfg.device_class.as_ref()),
            ("state_class", cfg.state_class.as_ref()),
            ("unit_of_measurement", cfg.unit.as_ref()),
            ("mode", cfg.mode.as_ref()),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                payload.insert(key.into(), json!(value));
            }
        }
        let limits = [("min", &cfg.min), ("max", &cfg.max), ("step", &cfg.step)];
        for (key, value) in limits {
            if let Some(value) = value {
                payload.insert(key.into(), json!(value.to_string()));
            }
        }
        if let Some(icon) = &cfg.icon {
            payload.insert("icon".into(), json!(format!("mdi:{icon}")));
        }

        payload.insert("name".into(), json!(format!("{} {}", self.name, cfg.name)));
        if cfg.kind != EntityKind::Button {
            payload.insert("state_topic".into(), json!(self.state_topic(cfg.kind)));
            payload.insert("availability_topic".into(), json!(self.availability_topic()));
            payload.insert(
                "value_template".into(),
                json!(format!("{{{{value_json.{entity}}}}}")),
            );
        }
        if cfg.kind.is_commandable() {
            payload.insert("command_topic".into(), json!(self.command_topic(cfg.kind, entity)));
        }
        payload.insert("unique_id".into(), json!(format!("{}_{entity}", self.name)));
        payload.insert(
            "device".into(),
            json!({
                "identifiers": [self.name],
                "name": self.name,
                "model": self.model,
                "manufacturer": self.manufacturer,
            }),
        );

        Some(Message::new(
            self.config_topic(cfg.kind, entity),
            Value::Object(payload).to_string(),
            QoS::AtLeastOnce,
            true,
        ))
    }

    pub fn config_messages(&self) -> Vec<Message> {
        self.entities
            .keys()
            .filter_map(|id| self.config_message(id))
            .collect()
    }

    /// Everything to publish after (re)connecting: discovery for all entities,
    /// availability and the setup command.
    pub fn connect_messages(&self) -> Vec<Message> {
        let mut messages = self.config_messages();
        messages.push(Message::new(self.availability_topic(), ONLINE, QoS::AtLeastOnce, true));
        messages.push(Message::new(self.device_command_topic(), SETUP, QoS::AtLeastOnce, true));
        messages
    }

    /// Topics the bus client should subscribe to
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics = vec![BUS_STATUS_TOPIC.to_string(), self.device_command_topic()];
        topics.extend(
            self.entities
                .iter()
                .filter(|(_, e)| e.config.kind.is_commandable())
                .map(|(id, e)| self.command_topic(e.config.kind, id)),
        );
        topics
    }

    /// Message the broker should publish if the bridge disappears
    pub fn last_will(&self) -> Message {
        Message::new(self.availability_topic(), OFFLINE, QoS::AtLeastOnce, true)
    }

    pub fn disconnect_messages(&self) -> Vec<Message> {
        vec![self.last_will()]
    }

    /// Classifies an incoming message. The last topic segment selects the
    /// entity; an `online` payload on any other topic asks for discovery to be
    /// published again.
    pub fn handle_message(&self, topic: &str, payload: &str) -> Inbound {
        let entity = topic.rsplit('/').next().unwrap_or(topic);

        if self.entities.contains_key(entity) {
            Inbound::Command {
                entity: entity.to_string(),
                value: EntityValue::parse(payload),
            }
        } else if payload == ONLINE {
            Inbound::Reconfigure
        } else {
            Inbound::Ignored
        }
    }
}
