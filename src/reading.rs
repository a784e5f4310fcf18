//! Decoded SwitchBot reading.

use std::fmt;

/// SwitchBot hardware variant, identified by the model code in service data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Meter,
    MeterPlus,
    Curtain,
    Button,
    HubMini,
    Contact,
    Unknown,
}

impl DeviceType {
    /// Map a model code byte to a device type.
    pub fn from_model_code(code: u8) -> Self {
        match code {
            0x54 => DeviceType::Meter,
            0x69 => DeviceType::MeterPlus,
            0x63 => DeviceType::Curtain,
            0x62 => DeviceType::Button,
            0x6d => DeviceType::HubMini,
            0x64 => DeviceType::Contact,
            _ => DeviceType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Meter => "Meter",
            DeviceType::MeterPlus => "MeterPlus",
            DeviceType::Curtain => "Curtain",
            DeviceType::Button => "Button",
            DeviceType::HubMini => "HubMini",
            DeviceType::Contact => "Contact",
            DeviceType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one device at one instant.
///
/// Only the fields the device type reports are `Some`; a `None` means the
/// device does not report that value, never that it reported zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_type: DeviceType,
    /// Battery level in percent (0-127 after masking)
    pub battery: Option<u8>,
    /// Temperature in Celsius, one decimal place
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<u8>,
    /// Curtain position in percent
    pub curtain_position: Option<u8>,
}

impl Reading {
    /// A reading of the given type with no fields populated.
    pub fn empty(device_type: DeviceType) -> Self {
        Self {
            device_type,
            battery: None,
            temperature: None,
            humidity: None,
            curtain_position: None,
        }
    }
}
