//! Latest reading per configured device.

use crate::mac_address::MacAddress;
use crate::reading::Reading;
use crate::registry::{DeviceConfig, DeviceRegistry};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Latest decoded reading of one device and when it was seen.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub reading: Reading,
    pub last_seen: SystemTime,
}

/// Last-writer-wins store of device readings.
///
/// Entries only ever exist for addresses in the registry; there is one
/// entry per configured device that has been seen at least once.
#[derive(Debug)]
pub struct DeviceStates {
    registry: Arc<DeviceRegistry>,
    states: BTreeMap<MacAddress, DeviceState>,
}

impl DeviceStates {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        Self {
            registry,
            states: BTreeMap::new(),
        }
    }

    /// Record a reading, stamped with the current time.
    ///
    /// Returns `false` and leaves the store untouched when the address is not
    /// a configured device.
    pub fn observe(&mut self, address: MacAddress, reading: Reading) -> bool {
        self.observe_at(address, reading, SystemTime::now())
    }

    /// Record a reading seen at `time`. The previous reading is replaced
    /// wholesale, fields are never merged.
    pub fn observe_at(&mut self, address: MacAddress, reading: Reading, time: SystemTime) -> bool {
        let Some(device) = self.registry.get(&address) else {
            return false;
        };

        debug!(
            %address,
            name = %device.name,
            device_type = %reading.device_type,
            battery = ?reading.battery,
            temperature = ?reading.temperature,
            humidity = ?reading.humidity,
            position = ?reading.curtain_position,
            "observed"
        );

        self.states.insert(
            address,
            DeviceState {
                reading,
                last_seen: time,
            },
        );
        true
    }

    pub fn get(&self, address: &MacAddress) -> Option<&DeviceState> {
        self.states.get(address)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Every seen device with its configuration, in address order.
    pub fn snapshot(&self) -> impl Iterator<Item = (&DeviceConfig, &DeviceState)> {
        self.states
            .iter()
            .filter_map(|(address, state)| self.registry.get(address).map(|c| (c, state)))
    }
}
