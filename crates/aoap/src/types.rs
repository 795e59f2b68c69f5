//! Device identity and classification types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable snapshot of a device's identity descriptors at attach time.
///
/// Vendor and product IDs are always present. Serial number and the
/// descriptor strings may be unavailable depending on platform
/// capability, and every consumer must tolerate their absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Serial number string (if available)
    pub serial_number: Option<String>,
    /// Bus-assigned device path, e.g. `/dev/bus/usb/001/004`.
    ///
    /// Stable for the lifetime of one physical connection but may be
    /// reused after re-enumeration.
    pub device_name: String,
    /// Manufacturer string (if available)
    pub manufacturer: Option<String>,
    /// Product string (if available)
    pub product: Option<String>,
    /// Bus number on the host
    pub bus_number: u8,
    /// Device address on the bus
    pub device_address: u8,
}

impl DeviceIdentity {
    /// Minimal identity from the fields that are always present.
    pub fn new(vendor_id: u16, product_id: u16, device_name: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            serial_number: None,
            device_name: device_name.into(),
            manufacturer: None,
            product: None,
            bus_number: 0,
            device_address: 0,
        }
    }

    /// Stable dedup key for this identity.
    pub fn key(&self) -> DeviceKey {
        DeviceKey::from_identity(self)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x} at {}",
            self.vendor_id, self.product_id, self.device_name
        )
    }
}

/// Stable identity key used for registry deduplication.
///
/// Derived once at lookup time: the serial number when the device
/// reports one, otherwise the `vendor:product:device-path` composite.
/// The key is carried explicitly; display names are never re-derived
/// for matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey(String);

impl DeviceKey {
    /// Wrap an already-canonical key string (e.g. user input to a
    /// removal command).
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive the key from an identity snapshot.
    pub fn from_identity(identity: &DeviceIdentity) -> Self {
        match &identity.serial_number {
            Some(serial) if !serial.is_empty() => Self(serial.clone()),
            _ => Self(format!(
                "{:04x}:{:04x}:{}",
                identity.vendor_id, identity.product_id, identity.device_name
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolved role of an attached device.
///
/// This is the only thing persisted as "device type"; the registry
/// stores it through [`ClassificationResult::as_str`] and uses
/// [`ClassificationResult::UNCLASSIFIED`] until classification succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassificationResult {
    /// iPhone-class companion device (CarPlay session candidate).
    CarPlayCompanion,
    /// Device already enumerates with an accessory-mode product ID.
    AndroidAccessoryActive,
    /// Handshake just completed; the device will re-enumerate.
    AndroidAccessoryNegotiated,
    /// Device does not speak the accessory protocol.
    Unsupported,
    /// Classification could not be determined (e.g. transfer error).
    Unknown,
}

impl ClassificationResult {
    /// Stored type value for a device that has not been classified yet.
    pub const UNCLASSIFIED: &'static str = "NA";

    /// Short string form used by the persistent registry.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CarPlayCompanion => "carplay",
            Self::AndroidAccessoryActive => "accessory",
            Self::AndroidAccessoryNegotiated => "negotiated",
            Self::Unsupported => "unsupported",
            Self::Unknown => "unknown",
        }
    }

    /// Parse the stored string form back, if it names a known variant.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "carplay" => Some(Self::CarPlayCompanion),
            "accessory" => Some(Self::AndroidAccessoryActive),
            "negotiated" => Some(Self::AndroidAccessoryNegotiated),
            "unsupported" => Some(Self::Unsupported),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
