//! BlueZ D-Bus backend for SwitchBot scanning.
//!
//! This backend uses the `bluer` crate to communicate with the BlueZ daemon
//! via D-Bus. It requires the `bluetoothd` daemon to be running. BlueZ
//! merges advertising and scan-response data into device properties, so each
//! record carries everything the device has announced so far.

use super::{
    ADVERTISEMENT_CHANNEL_BUFFER_SIZE, SWITCHBOT_SERVICE_UUIDS_16, ScanError,
    is_switchbot_candidate,
};
use crate::advertisement::{
    AD_TYPE_COMPLETE_128_UUIDS, AD_TYPE_SERVICE_DATA_16, AdStructure, AdValue, RawAdvertisement,
    uuid16,
};
use crate::decoder::SWITCHBOT_SERVICE_UUID;
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Address, Device, DeviceEvent, DeviceProperty, Session};
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

impl From<bluer::Error> for ScanError {
    fn from(err: bluer::Error) -> Self {
        ScanError::Bluetooth(err.to_string())
    }
}

/// Monitor patterns matching SwitchBot service data or the SwitchBot UUID.
fn switchbot_patterns() -> Vec<Pattern> {
    let mut patterns: Vec<Pattern> = SWITCHBOT_SERVICE_UUIDS_16
        .iter()
        .map(|uuid| Pattern {
            data_type: AD_TYPE_SERVICE_DATA_16,
            start_position: 0,
            content: uuid.to_le_bytes().to_vec(),
        })
        .collect();

    let mut marker = SWITCHBOT_SERVICE_UUID.as_bytes().to_vec();
    marker.reverse();
    patterns.push(Pattern {
        data_type: AD_TYPE_COMPLETE_128_UUIDS,
        start_position: 0,
        content: marker,
    });

    patterns
}

/// Start scanning for SwitchBot devices using the BlueZ D-Bus backend.
///
/// Each device found by the monitor is forwarded once and then watched for
/// service data changes, which are forwarded as new records.
pub async fn start_scan() -> Result<mpsc::Receiver<RawAdvertisement>, ScanError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(switchbot_patterns()),
            ..Default::default()
        })
        .await?;

    tokio::spawn(async move {
        // Keep all Bluetooth state alive by moving it into this task
        let _session = session;
        let _monitor_manager = monitor_manager;
        let mut watched: HashSet<Address> = HashSet::new();

        while let Some(event) = monitor_handle.next().await {
            let MonitorEvent::DeviceFound(device_id) = event else {
                continue;
            };

            let device = match adapter.device(device_id.device) {
                Ok(device) => device,
                Err(error) => {
                    warn!(address = %device_id.device, %error, "failed to open device");
                    continue;
                }
            };

            match forward(&device, &tx).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(error) => debug!(address = %device.address(), %error, "failed to read device"),
            }

            if watched.insert(device.address()) {
                tokio::spawn(watch(device, tx.clone()));
            }
        }
    });

    Ok(rx)
}

/// Forward every service data or UUID change of one device.
async fn watch(device: Device, tx: mpsc::Sender<RawAdvertisement>) {
    let mut events = match device.events().await {
        Ok(events) => Box::pin(events),
        Err(error) => {
            warn!(address = %device.address(), %error, "failed to watch device");
            return;
        }
    };

    while let Some(event) = events.next().await {
        if let DeviceEvent::PropertyChanged(
            DeviceProperty::ServiceData(_) | DeviceProperty::Uuids(_),
        ) = event
        {
            match forward(&device, &tx).await {
                Ok(true) => {}
                Ok(false) => return,
                Err(error) => debug!(address = %device.address(), %error, "failed to read device"),
            }
        }
    }
}

/// Send the device's current advertisement data.
///
/// Returns `Ok(false)` once the receiver is gone.
async fn forward(device: &Device, tx: &mpsc::Sender<RawAdvertisement>) -> Result<bool, ScanError> {
    let service_data = device.service_data().await?.unwrap_or_default();
    let uuids = device.uuids().await?.unwrap_or_default();

    let adv = RawAdvertisement::new(device.address().into(), elements(&service_data, &uuids));
    if !is_switchbot_candidate(&adv) {
        return Ok(true);
    }

    Ok(tx.send(adv).await.is_ok())
}

/// Rebuild on-air AD structures from BlueZ device properties.
///
/// Service data keyed by a 16-bit UUID gets its UUID prepended in
/// little-endian order, as it appears in the advertisement.
fn elements(service_data: &HashMap<Uuid, Vec<u8>>, uuids: &HashSet<Uuid>) -> Vec<AdStructure> {
    let mut elements: Vec<AdStructure> = service_data
        .iter()
        .filter_map(|(uuid, data)| {
            let short = uuid16(uuid)?;
            let mut bytes = short.to_le_bytes().to_vec();
            bytes.extend_from_slice(data);
            Some(AdStructure::new(AD_TYPE_SERVICE_DATA_16, AdValue::Data(bytes)))
        })
        .collect();

    let mut long_uuids: Vec<Uuid> = uuids.iter().filter(|u| uuid16(u).is_none()).copied().collect();
    if !long_uuids.is_empty() {
        long_uuids.sort();
        elements.push(AdStructure::new(
            AD_TYPE_COMPLETE_128_UUIDS,
            AdValue::Uuids(long_uuids),
        ));
    }

    elements
}
