use crate::advertisement::{
    AD_TYPE_COMPLETE_128_UUIDS, AD_TYPE_SERVICE_DATA_16, AdStructure, AdValue, RawAdvertisement,
};
use crate::decoder::SWITCHBOT_SERVICE_UUID;
use crate::mac_address::MacAddress;
use crate::registry::{DeviceConfig, DeviceRegistry};

/// A stable address for unit tests.
pub const TEST_MAC: MacAddress = MacAddress([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);

/// A second configured address.
pub const CONTACT_MAC: MacAddress = MacAddress([0x11, 0x22, 0x33, 0x44, 0x55, 0x66]);

/// An address that no test registry knows.
pub const STRANGER_MAC: MacAddress = MacAddress([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]);

/// Meter service data with the given battery, fraction, integer and humidity bytes.
pub fn meter_payload(battery: u8, fraction: u8, integer: u8, humidity: u8) -> Vec<u8> {
    vec![0x00, 0x0d, 0x54, 0x00, battery, fraction, integer, humidity]
}

/// Advertisement carrying the given hex-encoded service data.
pub fn advertisement(address: MacAddress, service_data_hex: &str) -> RawAdvertisement {
    let value = AdValue::from_hex(service_data_hex).expect("valid hex");
    RawAdvertisement::new(
        address,
        vec![
            AdStructure::new(0x01, AdValue::Data(vec![0x06])),
            AdStructure::new(AD_TYPE_SERVICE_DATA_16, value),
        ],
    )
}

/// Advertisement carrying only the SwitchBot service UUID.
pub fn marker_advertisement(address: MacAddress) -> RawAdvertisement {
    RawAdvertisement::new(
        address,
        vec![AdStructure::new(
            AD_TYPE_COMPLETE_128_UUIDS,
            AdValue::Uuids(vec![SWITCHBOT_SERVICE_UUID]),
        )],
    )
}

/// Registry with a meter at [`TEST_MAC`] and a contact sensor at [`CONTACT_MAC`].
pub fn test_registry() -> DeviceRegistry {
    DeviceRegistry::new(vec![
        DeviceConfig {
            address: TEST_MAC,
            location: "living".to_string(),
            device_type: "meter".to_string(),
            name: "Living Room".to_string(),
        },
        DeviceConfig {
            address: CONTACT_MAC,
            location: "entrance".to_string(),
            device_type: "contact".to_string(),
            name: "Front Door".to_string(),
        },
    ])
    .expect("unique addresses")
}
