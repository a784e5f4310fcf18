//! Raw advertisement records as delivered by a scanner backend.
//!
//! A record is the advertising address plus the AD structures the backend
//! saw for it. Nothing here knows about SwitchBot; see [`crate::decoder`].

use crate::mac_address::MacAddress;
use std::fmt;
use uuid::Uuid;

/// AD type: incomplete list of 128-bit service UUIDs.
pub const AD_TYPE_INCOMPLETE_128_UUIDS: u8 = 0x06;
/// AD type: complete list of 128-bit service UUIDs.
pub const AD_TYPE_COMPLETE_128_UUIDS: u8 = 0x07;
/// AD type: service data with a 16-bit service UUID.
pub const AD_TYPE_SERVICE_DATA_16: u8 = 0x16;
/// AD type: manufacturer specific data.
pub const AD_TYPE_MANUFACTURER_DATA: u8 = 0xFF;

/// Bluetooth base UUID (`0000xxxx-0000-1000-8000-00805f9b34fb`) with the
/// 16-bit slot zeroed.
const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Value carried by one AD structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdValue {
    /// Opaque bytes (service data, manufacturer data, ...).
    Data(Vec<u8>),
    /// A list of service UUIDs.
    Uuids(Vec<Uuid>),
}

impl AdValue {
    /// Parse the hex-string form some scanner stacks hand out (`"000d5400e4..."`).
    ///
    /// Returns `None` for odd-length or non-hex input.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() % 2 != 0 {
            return None;
        }
        (0..hex.len())
            .step_by(2)
            .map(|i| hex.get(i..i + 2).and_then(|b| u8::from_str_radix(b, 16).ok()))
            .collect::<Option<Vec<u8>>>()
            .map(AdValue::Data)
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            AdValue::Data(bytes) => Some(bytes),
            AdValue::Uuids(_) => None,
        }
    }

    pub fn contains_uuid(&self, uuid: &Uuid) -> bool {
        matches!(self, AdValue::Uuids(uuids) if uuids.contains(uuid))
    }
}

impl fmt::Display for AdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdValue::Data(bytes) => bytes.iter().try_for_each(|b| write!(f, "{b:02x}")),
            AdValue::Uuids(uuids) => {
                let mut first = true;
                for uuid in uuids {
                    if !first {
                        write!(f, ",")?;
                    }
                    first = false;
                    write!(f, "{uuid}")?;
                }
                Ok(())
            }
        }
    }
}

/// One AD structure: its type code and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdStructure {
    pub ad_type: u8,
    pub value: AdValue,
}

impl AdStructure {
    pub fn new(ad_type: u8, value: AdValue) -> Self {
        Self { ad_type, value }
    }

    /// Human-readable name of the AD type, in the wording BlueZ tools use.
    pub fn description(&self) -> &'static str {
        match self.ad_type {
            0x01 => "Flags",
            0x02 => "Incomplete 16b Services",
            0x03 => "Complete 16b Services",
            AD_TYPE_INCOMPLETE_128_UUIDS => "Incomplete 128b Services",
            AD_TYPE_COMPLETE_128_UUIDS => "Complete 128b Services",
            0x08 => "Short Local Name",
            0x09 => "Complete Local Name",
            0x0A => "Tx Power",
            AD_TYPE_SERVICE_DATA_16 => "16b Service Data",
            AD_TYPE_MANUFACTURER_DATA => "Manufacturer",
            _ => "Unknown",
        }
    }
}

/// One scan event: the advertising address and every AD structure seen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAdvertisement {
    pub address: MacAddress,
    pub elements: Vec<AdStructure>,
}

impl RawAdvertisement {
    pub fn new(address: MacAddress, elements: Vec<AdStructure>) -> Self {
        Self { address, elements }
    }

    /// First element of the given AD type.
    pub fn find(&self, ad_type: u8) -> Option<&AdStructure> {
        self.elements.iter().find(|e| e.ad_type == ad_type)
    }

    /// Insert or replace the element of the same AD type.
    ///
    /// Used by backends that see advertising and scan-response packets
    /// separately and need to present one merged view per device.
    pub fn merge(&mut self, element: AdStructure) {
        match self
            .elements
            .iter_mut()
            .find(|e| e.ad_type == element.ad_type)
        {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
    }
}

/// Short form of a UUID if it is derived from the Bluetooth base UUID.
pub fn uuid16(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    let short = ((value >> 96) & 0xFFFF) as u16;
    (value & !(0xFFFF_u128 << 96) == BLUETOOTH_BASE_UUID).then_some(short)
}

/// Parse a packed little-endian list of 128-bit UUIDs as found on air.
pub fn uuids_from_le_bytes(bytes: &[u8]) -> Vec<Uuid> {
    bytes
        .chunks_exact(16)
        .map(|chunk| {
            let mut be = [0u8; 16];
            be.copy_from_slice(chunk);
            be.reverse();
            Uuid::from_bytes(be)
        })
        .collect()
}
