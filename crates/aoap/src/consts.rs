//! Wire constants fixed by the accessory protocol
//!
//! These values are part of the control-transfer contract and must match
//! the device firmware exactly.

use std::time::Duration;

/// Vendor ID used by devices that have switched to accessory mode.
pub const AOAP_VENDOR_ID: u16 = 0x18D1;

/// Product IDs a device re-enumerates with once accessory mode is active.
///
/// 0x2D00 accessory, 0x2D01 accessory+ADB, 0x2D04 accessory+audio,
/// 0x2D05 accessory+audio+ADB.
pub const ACCESSORY_PRODUCT_IDS: [u16; 4] = [0x2D00, 0x2D01, 0x2D04, 0x2D05];

/// Vendor control request: query the accessory protocol version (IN, 2 bytes).
pub const REQUEST_GET_PROTOCOL: u8 = 51;

/// Vendor control request: push one identifying string (OUT).
pub const REQUEST_SEND_STRING: u8 = 52;

/// Vendor control request: switch the device into accessory mode (OUT, no payload).
pub const REQUEST_START: u8 = 53;

/// Hard per-transfer timeout for every handshake control transfer.
pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(2000);

/// Fixed identity of the iPhone-class companion device.
pub const CARPLAY_VENDOR_ID: u16 = 1452;
pub const CARPLAY_PRODUCT_ID: u16 = 4776;

/// Check whether a VID/PID pair enumerates as an already-active accessory.
pub fn is_accessory_product(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == AOAP_VENDOR_ID && ACCESSORY_PRODUCT_IDS.contains(&product_id)
}
