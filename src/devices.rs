use crate::tests;

/// Describes one supported FRAM part.
pub struct DeviceDescriptor {
    /// Manufacturer ID reported by the read-device-ID instruction.
    pub manufacturer_id: u8,
    /// Product ID (density and proprietary fields).
    pub product_id: u16,
    /// Capacity in bytes.
    pub capacity: u32,
    /// Whether the part implements the sleep instruction.
    pub supports_sleep: bool,
}

/// Supported FRAM devices, sorted by manufacturer then product ID.
pub const SUPPORTED_DEVICES: &[DeviceDescriptor] = &[
    // Fujitsu
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x0101, capacity: 2 * 1024, supports_sleep: false }, // MB85RS16
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x0302, capacity: 8 * 1024, supports_sleep: false }, // MB85RS64V
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x2303, capacity: 8 * 1024, supports_sleep: true }, // MB85RS64T
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x2503, capacity: 32 * 1024, supports_sleep: true }, // MB85RS256TY
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x2703, capacity: 128 * 1024, supports_sleep: true }, // MB85RS1MT
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x4803, capacity: 256 * 1024, supports_sleep: true }, // MB85RS2MTA
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x2803, capacity: 256 * 1024, supports_sleep: true }, // MB85RS2MT
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x4903, capacity: 512 * 1024, supports_sleep: true }, // MB85RS4MT
    DeviceDescriptor { manufacturer_id: 0x04, product_id: 0x490B, capacity: 512 * 1024, supports_sleep: true }, // MB85RS4MTY
    // Cypress (full manufacturer code 7F7F7F7F7F7FC2, device 0x2200)
    DeviceDescriptor { manufacturer_id: 0x7F, product_id: 0x7F7F, capacity: 32 * 1024, supports_sleep: false }, // FM25V02
    // Lapis
    DeviceDescriptor { manufacturer_id: 0xAE, product_id: 0x8305, capacity: 8 * 1024, supports_sleep: false }, // MR45V064B
];

/// Finds the capability entry for an identified device. `None` means the part
/// is not in the table, which callers treat as "unsupported", not as a fault.
pub fn lookup(manufacturer_id: u8, product_id: u16) -> Option<&'static DeviceDescriptor> {
    SUPPORTED_DEVICES
        .iter()
        .find(|device| device.manufacturer_id == manufacturer_id && device.product_id == product_id)
}

tests! {
    lookup_tests,

    |((manufacturer_id, product_id), expected_capacity): ((u8, u16), Option<u32>)| {
        let actual = lookup(manufacturer_id, product_id).map(|device| device.capacity);
        assert_eq!(expected_capacity, actual);
    },

    given_mb85rs64v_should_return_8KiB: ((0x04, 0x0302), Some(8 * 1024)),
    given_mb85rs1mt_should_return_128KiB: ((0x04, 0x2703), Some(128 * 1024)),
    given_fm25v02_should_return_32KiB: ((0x7F, 0x7F7F), Some(32 * 1024)),
    given_mr45v064b_should_return_8KiB: ((0xAE, 0x8305), Some(8 * 1024)),
    given_unknown_product_should_return_none: ((0x04, 0xBEEF), None),
    given_unknown_manufacturer_should_return_none: ((0xC2, 0x0302), None),
}

tests! {
    sleep_support_tests,

    |((manufacturer_id, product_id), expected): ((u8, u16), Option<bool>)| {
        let actual = lookup(manufacturer_id, product_id).map(|device| device.supports_sleep);
        assert_eq!(expected, actual);
    },

    given_mb85rs16_should_not_support_sleep: ((0x04, 0x0101), Some(false)),
    given_mb85rs4mty_should_support_sleep: ((0x04, 0x490B), Some(true)),
    given_fm25v02_should_not_support_sleep: ((0x7F, 0x7F7F), Some(false)),
}
