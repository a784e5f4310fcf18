//! Settings file loading.
//!
//! The settings file is JSON:
//!
//! ```json
//! {
//!   "devices": {
//!     "AA:BB:CC:DD:EE:FF": { "location": "living", "type": "meter", "name": "Living Room" }
//!   },
//!   "pushgateway": "localhost:9091",
//!   "mqtt": { "host": "localhost", "port": 1883, "topic": "iot" }
//! }
//! ```
//!
//! `mqtt` may be omitted to disable the MQTT sink.

use crate::mac_address::{MacAddress, ParseMacError};
use crate::registry::{DeviceConfig, DeviceRegistry, RegistryError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading the settings file. All of them are fatal at start-up.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed device address: {0}")]
    Address(#[from] ParseMacError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// MQTT sink configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker hostname or IP address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Topic every sample is published to.
    pub topic: String,
    /// MQTT client identifier.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            topic: "iot".to_string(),
            client_id: "switchbot-probe".to_string(),
            keep_alive_secs: 30,
        }
    }
}

#[derive(Deserialize)]
struct SettingsFile {
    devices: BTreeMap<String, DeviceConfig>,
    pushgateway: String,
    #[serde(default)]
    mqtt: Option<MqttConfig>,
}

/// Everything loaded from the settings file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub registry: DeviceRegistry,
    /// Pushgateway address, `host:port` or a full URL.
    pub pushgateway: String,
    pub mqtt: Option<MqttConfig>,
}

impl Settings {
    /// Read and parse the settings file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parse settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let file: SettingsFile = serde_json::from_str(text)?;

        let devices = file
            .devices
            .into_iter()
            .map(|(address, mut device)| -> Result<DeviceConfig, ConfigError> {
                device.address = address.parse::<MacAddress>()?;
                Ok(device)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Settings {
            registry: DeviceRegistry::new(devices)?,
            pushgateway: file.pushgateway,
            mqtt: file.mqtt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TEST_MAC;
    use std::io::Write;

    const SETTINGS: &str = r#"{
        "devices": {
            "aa:bb:cc:dd:ee:ff": { "location": "living", "type": "meter", "name": "Living Room" },
            "11:22:33:44:55:66": { "location": "entrance", "type": "contact", "name": "Front Door" }
        },
        "pushgateway": "localhost:9091",
        "mqtt": { "host": "broker.local", "topic": "home" }
    }"#;

    #[test]
    fn test_from_json() {
        let settings = Settings::from_json(SETTINGS).unwrap();
        assert_eq!(settings.registry.len(), 2);
        let meter = settings.registry.get(&TEST_MAC).unwrap();
        assert_eq!(meter.address, TEST_MAC);
        assert_eq!(meter.location, "living");
        assert_eq!(meter.device_type, "meter");
        assert_eq!(settings.pushgateway, "localhost:9091");

        let mqtt = settings.mqtt.unwrap();
        assert_eq!(mqtt.host, "broker.local");
        assert_eq!(mqtt.topic, "home");
        assert_eq!(mqtt.port, 1883);
        assert_eq!(mqtt.client_id, "switchbot-probe");
    }

    #[test]
    fn test_mqtt_optional() {
        let settings =
            Settings::from_json(r#"{"devices": {}, "pushgateway": "http://gw:9091"}"#).unwrap();
        assert!(settings.mqtt.is_none());
        assert!(settings.registry.is_empty());
    }

    #[test]
    fn test_mqtt_defaults() {
        let config = MqttConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1883);
        assert_eq!(config.topic, "iot");
        assert_eq!(config.keep_alive_secs, 30);
    }

    #[test]
    fn test_missing_pushgateway_is_error() {
        let result = Settings::from_json(r#"{"devices": {}}"#);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_bad_address_is_error() {
        let result = Settings::from_json(
            r#"{"devices": {"not-a-mac": {"location": "a", "type": "b", "name": "c"}},
                "pushgateway": "gw:9091"}"#,
        );
        assert!(matches!(result, Err(ConfigError::Address(_))));
    }

    #[test]
    fn test_same_address_different_case_is_duplicate() {
        let result = Settings::from_json(
            r#"{"devices": {
                    "aa:bb:cc:dd:ee:ff": {"location": "a", "type": "b", "name": "c"},
                    "AA:BB:CC:DD:EE:FF": {"location": "a", "type": "b", "name": "d"}
                },
                "pushgateway": "gw:9091"}"#,
        );
        assert!(matches!(
            result,
            Err(ConfigError::Registry(RegistryError::DuplicateAddress(mac))) if mac == TEST_MAC
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.registry.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Settings::load(Path::new("/nonexistent/settings.json"));
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/settings.json"));
    }
}
