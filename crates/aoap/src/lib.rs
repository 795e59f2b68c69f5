//! Accessory Open Protocol (AOAP) negotiation for aoap-host
//!
//! This crate implements the vendor control-transfer handshake used to
//! switch a USB peripheral into accessory mode, and the classification
//! logic that resolves a freshly attached device's role from its
//! descriptors and (when needed) the handshake outcome.
//!
//! The crate is transport-agnostic: all wire traffic goes through the
//! [`ControlChannel`] trait, so the handshake and classifier can be
//! exercised against a scripted channel in tests (see [`test_utils`])
//! and against a real libusb handle in the host binary.
//!
//! # Example
//!
//! ```
//! use aoap::test_utils::MockChannel;
//! use aoap::{AccessoryStrings, ClassificationResult, DeviceIdentity, classify};
//!
//! // A device that answers the version query with protocol version 2.
//! let mut channel = MockChannel::supporting(2);
//! let identity = DeviceIdentity::new(0x0B05, 0x7770, "/dev/bus/usb/001/004");
//!
//! let outcome = classify(&identity, &AccessoryStrings::default(), &mut channel);
//! assert_eq!(outcome.result, ClassificationResult::AndroidAccessoryNegotiated);
//! ```

pub mod channel;
pub mod classify;
pub mod client;
pub mod consts;
pub mod error;
pub mod session;
pub mod test_utils;
pub mod types;

pub use channel::{ControlChannel, ControlDirection};
pub use classify::{AccessoryStrings, ClassificationOutcome, classify};
pub use client::{AccessoryProtocolClient, StringSendWarning};
pub use consts::{
    ACCESSORY_PRODUCT_IDS, AOAP_VENDOR_ID, CARPLAY_PRODUCT_ID, CARPLAY_VENDOR_ID,
    REQUEST_GET_PROTOCOL, REQUEST_SEND_STRING, REQUEST_START, TRANSFER_TIMEOUT,
    is_accessory_product,
};
pub use error::{Result, TransferError};
pub use session::{HandshakePhase, HandshakeSession, STRING_SLOT_COUNT, StringSlot};
pub use types::{ClassificationResult, DeviceIdentity, DeviceKey};
