//! Bluetooth device address used as the key for configured SwitchBot devices.
//!
//! Addresses are stored as raw bytes, so `aa:bb:..` and `AA:BB:..` from the
//! settings file or a scanner backend always land on the same key.

use serde::{Deserialize, Deserializer};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth device address stored as a compact 6-byte array.
///
/// Displays in the canonical uppercase colon-separated form used by the
/// settings file (`AA:BB:CC:DD:EE:FF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Build an address from the little-endian byte order used in HCI events.
    pub fn from_le_bytes(mut bytes: [u8; 6]) -> Self {
        bytes.reverse();
        Self(bytes)
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Errors returned when parsing an address string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseMacError {
    #[error("invalid address '{0}': expected 6 colon-separated parts")]
    InvalidLength(String),
    #[error("invalid address '{0}': '{1}' is not a hex byte")]
    InvalidHex(String, String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split(':').collect();
        if parts.len() != 6 {
            return Err(ParseMacError::InvalidLength(trimmed.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(ParseMacError::InvalidHex(
                    trimmed.to_string(),
                    part.to_string(),
                ));
            }
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| ParseMacError::InvalidHex(trimmed.to_string(), part.to_string()))?;
        }

        Ok(MacAddress(bytes))
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for MacAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_uppercase() {
        let addr = MacAddress([0xd4, 0x0b, 0x3c, 0x01, 0xa2, 0xff]);
        assert_eq!(addr.to_string(), "D4:0B:3C:01:A2:FF");
    }

    #[test]
    fn test_lowercase_and_uppercase_parse_to_same_key() {
        let lower: MacAddress = "d4:0b:3c:01:a2:ff".parse().unwrap();
        let upper: MacAddress = "D4:0B:3C:01:A2:FF".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.to_string(), "D4:0B:3C:01:A2:FF");
    }

    #[test]
    fn test_from_le_bytes_reverses() {
        let addr = MacAddress::from_le_bytes([0xFF, 0xEE, 0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(addr, MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));
    }

    #[test]
    fn test_from_str_invalid() {
        assert!(matches!(
            "AA:BB:CC".parse::<MacAddress>(),
            Err(ParseMacError::InvalidLength(_))
        ));
        assert!(matches!(
            "AA:BB:CC:DD:EE:GG".parse::<MacAddress>(),
            Err(ParseMacError::InvalidHex(_, part)) if part == "GG"
        ));
        assert!(matches!(
            "AA:BB:CC:DD:EE:F".parse::<MacAddress>(),
            Err(ParseMacError::InvalidHex(_, _))
        ));
    }

    #[test]
    fn test_deserialize_from_json_string() {
        let addr: MacAddress = serde_json::from_str("\"aa:bb:cc:dd:ee:ff\"").unwrap();
        assert_eq!(addr, MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]));

        let err = serde_json::from_str::<MacAddress>("\"nope\"").unwrap_err();
        assert!(err.to_string().contains("invalid address"));
    }
}
