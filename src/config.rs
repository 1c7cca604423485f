//! # Bridge Configuration
//!
//! The bridge is configured from a YAML file, loaded once at startup:
//!
//! ```yaml
//! serial:
//!   port: /dev/ttyAMA0
//!   baudrate: 9600
//!   timeout_ms: 5000
//! poll_interval_secs: 10
//! max_interval_secs: 3600
//! publisher: mqtt
//! broker:
//!   host: localhost
//!   port: 1883
//!   client_id: sml-bridge
//!   username: meter
//!   password: secret
//! device:
//!   name: power_meter
//!   model: DD3
//!   manufacturer: EasyMeter
//! entities:
//!   energy_import:
//!     offset: 167
//!     name: Total energy imported
//!     device_class: energy
//!     state_class: total_increasing
//!     unit: Wh
//! ```
//!
//! Entity ids are the keys of `entities`; they name the JSON fields of the
//! state payload and become part of topics, so they are kept stable.

use crate::constants::{
    DEFAULT_BAUDRATE, DEFAULT_MAX_INTERVAL_SECS, DEFAULT_MQTT_CLIENT_ID,
    DEFAULT_MQTT_KEEP_ALIVE_SECS, DEFAULT_MQTT_PORT, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_SERIAL_PORT,
};
use crate::error::SmlError;
use crate::sml::transport::SerialConfig;
use crate::tracker::EntityDescriptor;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialSettings,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u64,
    #[serde(default)]
    pub publisher: PublisherKind,
    #[serde(default)]
    pub broker: Option<BrokerConfig>,
    pub device: DeviceConfig,
    pub entities: BTreeMap<String, EntityConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SerialSettings {
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_baudrate")]
    pub baudrate: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SerialSettings {
    fn default() -> Self {
        SerialSettings {
            port: default_port(),
            baudrate: default_baudrate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// MQTT broker connection, required for `publisher: mqtt`
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

/// Device metadata shown by the home-automation side
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub manufacturer: String,
}

/// Where published messages go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublisherKind {
    /// An MQTT broker, see `BrokerConfig`
    Mqtt,
    /// One JSON record per message on stdout
    #[default]
    JsonLines,
    /// Messages are only logged
    Log,
}

/// Component type of an entity on the home-automation side
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Sensor,
    Switch,
    Number,
    Button,
}

impl EntityKind {
    /// Kinds that carry a state payload, in publish order
    pub const STATEFUL: [EntityKind; 3] = [EntityKind::Sensor, EntityKind::Switch, EntityKind::Number];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensor",
            EntityKind::Switch => "switch",
            EntityKind::Number => "number",
            EntityKind::Button => "button",
        }
    }

    /// Whether the entity accepts commands from the bus
    pub fn is_commandable(&self) -> bool {
        matches!(self, EntityKind::Switch | EntityKind::Number | EntityKind::Button)
    }
}

/// One meter value exposed as an entity
#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    /// Offset of the value's tag byte inside the SML message
    pub offset: usize,
    /// Human readable name, prefixed with the device name on the bus
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: EntityKind,
    pub device_class: Option<String>,
    pub state_class: Option<String>,
    pub unit: Option<String>,
    pub icon: Option<String>,
    pub min: Option<serde_json::Number>,
    pub max: Option<serde_json::Number>,
    pub step: Option<serde_json::Number>,
    pub mode: Option<String>,
}

fn default_port() -> String {
    DEFAULT_SERIAL_PORT.to_string()
}

fn default_baudrate() -> u32 {
    DEFAULT_BAUDRATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_client_id() -> String {
    DEFAULT_MQTT_CLIENT_ID.to_string()
}

fn default_keep_alive() -> u64 {
    DEFAULT_MQTT_KEEP_ALIVE_SECS
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_max_interval() -> u64 {
    DEFAULT_MAX_INTERVAL_SECS
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SmlError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SmlError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    /// Parses and validates a configuration document.
    pub fn from_yaml_str(text: &str) -> Result<Self, SmlError> {
        let config: Config =
            serde_yaml::from_str(text).map_err(|e| SmlError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SmlError> {
        if self.device.name.trim().is_empty() {
            return Err(SmlError::ConfigError("device name must not be empty".into()));
        }
        if self.entities.is_empty() {
            return Err(SmlError::ConfigError("no entities configured".into()));
        }
        for (id, entity) in &self.entities {
            if id.trim().is_empty() {
                return Err(SmlError::ConfigError("entity id must not be empty".into()));
            }
            if entity.name.trim().is_empty() {
                return Err(SmlError::ConfigError(format!("entity '{id}' has no name")));
            }
        }
        if self.serial.baudrate == 0 {
            return Err(SmlError::ConfigError("baudrate must not be zero".into()));
        }
        if self.serial.timeout_ms == 0 {
            return Err(SmlError::ConfigError("serial timeout must not be zero".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(SmlError::ConfigError("poll interval must not be zero".into()));
        }
        if self.publisher == PublisherKind::Mqtt {
            let broker = self.broker.as_ref().ok_or_else(|| {
                SmlError::ConfigError("publisher mqtt needs a broker section".into())
            })?;
            if broker.host.trim().is_empty() {
                return Err(SmlError::ConfigError("broker host must not be empty".into()));
            }
            if broker.client_id.trim().is_empty() {
                return Err(SmlError::ConfigError("broker client_id must not be empty".into()));
            }
            if broker.password.is_some() && broker.username.is_none() {
                return Err(SmlError::ConfigError("broker password given without username".into()));
            }
        }
        Ok(())
    }

    pub fn serial_config(&self) -> SerialConfig {
        SerialConfig {
            port: self.serial.port.clone(),
            baudrate: self.serial.baudrate,
            timeout: Duration::from_millis(self.serial.timeout_ms),
        }
    }

    /// Offsets the tracker decodes, in entity id order.
    pub fn entity_descriptors(&self) -> Vec<EntityDescriptor> {
        self.entities
            .iter()
            .map(|(id, entity)| EntityDescriptor::new(id.clone(), entity.offset))
            .collect()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }
}
