//! Device role classification
//!
//! Decision logic that routes a freshly attached device into one of the
//! [`ClassificationResult`] outcomes, driving the accessory handshake
//! when the descriptors alone are not conclusive.

use crate::channel::ControlChannel;
use crate::client::{AccessoryProtocolClient, StringSendWarning};
use crate::consts::{CARPLAY_PRODUCT_ID, CARPLAY_VENDOR_ID, is_accessory_product};
use crate::session::StringSlot;
use crate::types::{ClassificationResult, DeviceIdentity};
use tracing::{debug, info};

/// The six identifying strings pushed during the handshake.
///
/// The protocol does not require real device metadata, only well-formed
/// strings; the defaults match the values the accessory start sequence
/// has always advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessoryStrings {
    pub manufacturer: String,
    pub model: String,
    pub description: String,
    pub version: String,
    pub uri: String,
    pub serial: String,
}

impl Default for AccessoryStrings {
    fn default() -> Self {
        Self {
            manufacturer: "Manufacturer".to_string(),
            model: "Model".to_string(),
            description: "Description".to_string(),
            version: "1.0".to_string(),
            uri: "https://www.android.com/auto".to_string(),
            serial: "1234".to_string(),
        }
    }
}

impl AccessoryStrings {
    fn for_slot(&self, slot: StringSlot) -> &str {
        match slot {
            StringSlot::Manufacturer => &self.manufacturer,
            StringSlot::Model => &self.model,
            StringSlot::Description => &self.description,
            StringSlot::Version => &self.version,
            StringSlot::Uri => &self.uri,
            StringSlot::Serial => &self.serial,
        }
    }
}

/// Classification result plus any best-effort handshake warnings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationOutcome {
    pub result: ClassificationResult,
    pub warnings: Vec<StringSendWarning>,
}

impl ClassificationOutcome {
    fn clean(result: ClassificationResult) -> Self {
        Self {
            result,
            warnings: Vec::new(),
        }
    }
}

/// Classify an attached device, driving the handshake when applicable.
///
/// The channel is consumed so it is released on every exit path. The
/// descriptor-only rules are checked first: an already-active accessory
/// device must never be re-sent the handshake, so that check strictly
/// precedes the protocol probe.
pub fn classify<C: ControlChannel>(
    identity: &DeviceIdentity,
    strings: &AccessoryStrings,
    channel: C,
) -> ClassificationOutcome {
    if is_accessory_product(identity.vendor_id, identity.product_id) {
        info!("device {} already in accessory mode", identity);
        return ClassificationOutcome::clean(ClassificationResult::AndroidAccessoryActive);
    }

    if identity.vendor_id == CARPLAY_VENDOR_ID && identity.product_id == CARPLAY_PRODUCT_ID {
        info!("device {} is an iPhone-class companion", identity);
        return ClassificationOutcome::clean(ClassificationResult::CarPlayCompanion);
    }

    let mut client = AccessoryProtocolClient::new(channel);

    if !client.is_supported() {
        debug!("device {} does not support the accessory protocol", identity);
        return ClassificationOutcome::clean(ClassificationResult::Unsupported);
    }

    for slot in StringSlot::ALL {
        client.send_identifying_string(slot, strings.for_slot(slot));
    }

    // Negotiated regardless of individual string-send warnings, as long
    // as the start command itself went through.
    let result = match client.start() {
        Ok(()) => {
            info!("accessory mode negotiated for {}, device will re-enumerate", identity);
            ClassificationResult::AndroidAccessoryNegotiated
        }
        Err(_) => ClassificationResult::Unknown,
    };

    ClassificationOutcome {
        result,
        warnings: client.into_warnings(),
    }
}
