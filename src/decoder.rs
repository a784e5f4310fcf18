//! SwitchBot advertisement decoding.
//!
//! SwitchBot devices broadcast their telemetry as 16-bit service data:
//!
//! ```text
//! byte 0-1  service UUID (little-endian)
//! byte 2    model code
//! byte 3    mode flags
//! byte 4..  model specific payload
//! ```
//!
//! Older firmware also advertises the complete 128-bit service UUID
//! [`SWITCHBOT_SERVICE_UUID`], which on its own only marks the device as a
//! SwitchBot without carrying telemetry.

use crate::advertisement::{AD_TYPE_COMPLETE_128_UUIDS, AD_TYPE_SERVICE_DATA_16, RawAdvertisement};
use crate::mac_address::MacAddress;
use crate::reading::{DeviceType, Reading};
use thiserror::Error;
use uuid::{Uuid, uuid};

/// 128-bit service UUID advertised by SwitchBot devices.
pub const SWITCHBOT_SERVICE_UUID: Uuid = uuid!("cba20d00-224d-11e6-9fb8-0002a5d5c51b");

const MODEL_OFFSET: usize = 2;
const BATTERY_OFFSET: usize = 4;
const BATTERY_MASK: u8 = 0x7F;

/// Errors for service data that claims to be SwitchBot but can't be decoded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    /// Service data ends before the model code
    #[error("Service data too short for model code: {0} bytes")]
    MissingModel(usize),
    /// Payload shorter than the model requires
    #[error("{model} payload too short: expected at least {needed} bytes, got {len}")]
    Truncated {
        model: DeviceType,
        needed: usize,
        len: usize,
    },
}

/// Convenience alias for decoder output.
pub type DecodeResult = Result<Option<(MacAddress, Reading)>, DecodeError>;

/// Decode one advertisement.
///
/// Returns `Ok(None)` when the advertisement carries neither SwitchBot
/// service data nor the SwitchBot service UUID. A marker-only advertisement
/// yields an [`DeviceType::Unknown`] reading with no fields.
///
/// The decoder is pure: the same advertisement always yields the same result.
pub fn decode(raw: &RawAdvertisement) -> DecodeResult {
    let service_data = raw
        .find(AD_TYPE_SERVICE_DATA_16)
        .and_then(|e| e.value.as_data());

    if let Some(data) = service_data {
        return decode_service_data(data).map(|reading| Some((raw.address, reading)));
    }

    let has_marker = raw.elements.iter().any(|e| {
        e.ad_type == AD_TYPE_COMPLETE_128_UUIDS && e.value.contains_uuid(&SWITCHBOT_SERVICE_UUID)
    });

    Ok(has_marker.then(|| (raw.address, Reading::empty(DeviceType::Unknown))))
}

/// Decode the service data bytes of one SwitchBot advertisement.
pub fn decode_service_data(data: &[u8]) -> Result<Reading, DecodeError> {
    let Some(&code) = data.get(MODEL_OFFSET) else {
        return Err(DecodeError::MissingModel(data.len()));
    };

    let model = DeviceType::from_model_code(code);
    let needed = required_len(model);
    if data.len() < needed {
        return Err(DecodeError::Truncated {
            model,
            needed,
            len: data.len(),
        });
    }

    let mut reading = Reading::empty(model);
    match model {
        DeviceType::Meter | DeviceType::MeterPlus => {
            reading.battery = Some(battery(data));
            reading.temperature = Some(temperature(data[5], data[6]));
            reading.humidity = Some(data[7] % 128);
        }
        DeviceType::Curtain => {
            reading.battery = Some(battery(data));
            reading.curtain_position = Some(data[5] & 0x7F);
        }
        DeviceType::Button => {
            reading.battery = Some(battery(data));
        }
        DeviceType::HubMini | DeviceType::Contact | DeviceType::Unknown => {}
    }

    Ok(reading)
}

fn required_len(model: DeviceType) -> usize {
    match model {
        DeviceType::Meter | DeviceType::MeterPlus => 8,
        DeviceType::Curtain => 6,
        DeviceType::Button => 5,
        DeviceType::HubMini | DeviceType::Contact | DeviceType::Unknown => MODEL_OFFSET + 1,
    }
}

fn battery(data: &[u8]) -> u8 {
    data[BATTERY_OFFSET] & BATTERY_MASK
}

/// Combine the fraction nibble and the sign-flagged integer byte.
///
/// Bit 7 of the integer byte set means above zero. Computed in tenths so the
/// result carries exactly one decimal place.
fn temperature(fraction_byte: u8, integer_byte: u8) -> f64 {
    let fraction = i32::from(fraction_byte & 0x0F);
    let tenths = if integer_byte < 128 {
        -(i32::from(integer_byte) * 10 + fraction)
    } else {
        i32::from(integer_byte - 128) * 10 + fraction
    };
    f64::from(tenths) / 10.0
}
