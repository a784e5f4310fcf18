//! BLE scanner abstraction for SwitchBot devices.
//!
//! A backend delivers [`RawAdvertisement`] records through a channel, one per
//! scan event, in discovery order. Backends filter out advertisements that
//! can't come from a SwitchBot device but otherwise do no decoding.

#[cfg(feature = "bluer")]
pub mod bluer;

#[cfg(feature = "hci")]
pub mod hci;

use crate::advertisement::{AD_TYPE_COMPLETE_128_UUIDS, AD_TYPE_SERVICE_DATA_16, RawAdvertisement};
use crate::decoder::SWITCHBOT_SERVICE_UUID;
use thiserror::Error;

/// Error type for scanner operations.
#[derive(Error, Debug)]
pub enum ScanError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
}

/// 16-bit service UUIDs SwitchBot devices put in their service data.
///
/// `0x0d00` is used by older firmware, `0xfd3d` by current devices.
pub const SWITCHBOT_SERVICE_UUIDS_16: [u16; 2] = [0x0d00, 0xfd3d];

/// Channel buffer size for advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// BlueZ D-Bus backend (requires bluetoothd daemon)
    #[cfg(feature = "bluer")]
    Bluer,
    /// Raw HCI socket backend (direct kernel access, no daemon required)
    #[cfg(feature = "hci")]
    Hci,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "bluer")]
        return Backend::Bluer;
        #[cfg(all(feature = "hci", not(feature = "bluer")))]
        return Backend::Hci;
        #[cfg(not(any(feature = "bluer", feature = "hci")))]
        compile_error!("At least one backend feature must be enabled");
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "bluer")]
            Backend::Bluer => write!(f, "bluer"),
            #[cfg(feature = "hci")]
            Backend::Hci => write!(f, "hci"),
            #[cfg(not(any(feature = "bluer", feature = "hci")))]
            _ => unreachable!("Backend enum has no variants when no backend features are enabled"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "bluer")]
            "bluer" | "bluez" => Ok(Backend::Bluer),
            #[cfg(feature = "hci")]
            "hci" | "raw" => Ok(Backend::Hci),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Whether an advertisement may come from a SwitchBot device.
///
/// True for SwitchBot service data or the SwitchBot 128-bit service UUID.
pub fn is_switchbot_candidate(adv: &RawAdvertisement) -> bool {
    adv.elements.iter().any(|e| match e.ad_type {
        AD_TYPE_SERVICE_DATA_16 => e
            .value
            .as_data()
            .and_then(|data| data.get(..2))
            .is_some_and(|uuid| {
                SWITCHBOT_SERVICE_UUIDS_16.contains(&u16::from_le_bytes([uuid[0], uuid[1]]))
            }),
        AD_TYPE_COMPLETE_128_UUIDS => e.value.contains_uuid(&SWITCHBOT_SERVICE_UUID),
        _ => false,
    })
}

/// Start scanning for SwitchBot advertisements using the specified backend.
///
/// Runs until the receiver is dropped or the backend fails.
pub async fn start_scan(
    backend: Backend,
) -> Result<tokio::sync::mpsc::Receiver<RawAdvertisement>, ScanError> {
    match backend {
        #[cfg(feature = "bluer")]
        Backend::Bluer => bluer::start_scan().await,
        #[cfg(feature = "hci")]
        Backend::Hci => hci::start_scan().await,
    }
}
