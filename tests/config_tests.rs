//! Loading the YAML configuration from disk.

use sml_bridge::config::{Config, EntityKind, PublisherKind};
use sml_bridge::error::SmlError;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const FULL: &str = r#"
serial:
  port: /dev/ttyUSB0
  baudrate: 9600
  timeout_ms: 2000
poll_interval_secs: 5
max_interval_secs: 600
publisher: log
device:
  name: power_meter
  model: MT681
  manufacturer: ISKRA
entities:
  energy_import:
    offset: 167
    name: Total energy imported
    device_class: energy
    state_class: total_increasing
    unit: Wh
  energy_export:
    offset: 198
    name: Total energy exported
    device_class: energy
    state_class: total_increasing
    unit: Wh
  tariff:
    offset: 0
    name: Tariff
    type: number
    min: 1
    max: 2
    step: 1
    mode: box
"#;

fn write_config(text: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(text.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(FULL);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.serial.port, "/dev/ttyUSB0");
    assert_eq!(config.poll_interval(), Duration::from_secs(5));
    assert_eq!(config.max_interval(), Duration::from_secs(600));
    assert_eq!(config.publisher, PublisherKind::Log);
    assert_eq!(config.device.model, "MT681");

    let serial = config.serial_config();
    assert_eq!(serial.baudrate, 9600);
    assert_eq!(serial.timeout, Duration::from_millis(2000));

    let tariff = &config.entities["tariff"];
    assert_eq!(tariff.kind, EntityKind::Number);
    assert!(tariff.kind.is_commandable());

    let descriptors = config.entity_descriptors();
    let offsets: Vec<(&str, usize)> = descriptors
        .iter()
        .map(|d| (d.id.as_str(), d.offset))
        .collect();
    assert_eq!(
        offsets,
        vec![("energy_export", 198), ("energy_import", 167), ("tariff", 0)]
    );
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, SmlError::ConfigError(msg) if msg.contains("absent.yaml")));
}

#[test]
fn test_malformed_yaml() {
    let file = write_config("device: [unclosed\n");
    assert!(matches!(
        Config::load(file.path()),
        Err(SmlError::ConfigError(_))
    ));
}

#[test]
fn test_example_config_loads() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config.example.yaml");
    let config = Config::load(path).unwrap();

    assert_eq!(config.device.name, "power_meter");
    assert_eq!(config.publisher, PublisherKind::Mqtt);
    let broker = config.broker.as_ref().unwrap();
    assert_eq!((broker.host.as_str(), broker.port), ("localhost", 1883));
    assert_eq!(broker.username.as_deref(), Some("meter"));
    assert_eq!(config.entities.len(), 2);
    assert_eq!(config.entities["energy_import"].offset, 167);
    assert_eq!(
        config.entities["energy_export"].icon.as_deref(),
        Some("transmission-tower-export")
    );
}
