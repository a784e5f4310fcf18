//! Static registry of configured SwitchBot devices.
//!
//! Loaded once at start-up and shared read-only afterwards. Only addresses
//! in the registry are ever tracked or exported.

use crate::mac_address::MacAddress;
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Metadata for one configured device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceConfig {
    #[serde(skip)]
    pub address: MacAddress,
    pub location: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub name: String,
}

/// Errors building a registry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("device {0} is configured more than once")]
    DuplicateAddress(MacAddress),
}

/// Address-keyed lookup of configured devices.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<MacAddress, DeviceConfig>,
}

impl DeviceRegistry {
    /// Build a registry, rejecting two entries for the same address.
    pub fn new(devices: impl IntoIterator<Item = DeviceConfig>) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for device in devices {
            let address = device.address;
            if map.insert(address, device).is_some() {
                return Err(RegistryError::DuplicateAddress(address));
            }
        }
        Ok(Self { devices: map })
    }

    pub fn get(&self, address: &MacAddress) -> Option<&DeviceConfig> {
        self.devices.get(address)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
