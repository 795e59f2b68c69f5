//! Transfer-permission broker
//!
//! The orchestrator never opens a device before the permission
//! collaborator has answered for that identity. On a Linux host the
//! grant manifests as open access on the device node, so the default
//! broker probes `open()` and reports the decision; denial terminates
//! only the current attachment's orchestration.

use crate::usb::find_device;
use aoap::DeviceIdentity;
use rusb::Context;
use tracing::{debug, warn};

/// Outcome of a transfer-permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Granted,
    Denied,
}

/// Permission collaborator consumed by the orchestrator.
pub trait PermissionBroker {
    /// Request transfer access for `identity`.
    ///
    /// The decision is fed back to the orchestrator as an explicit
    /// permission event correlated by identity.
    fn request_transfer_permission(&self, identity: &DeviceIdentity) -> PermissionDecision;
}

/// Broker that probes device-node access through libusb.
pub struct HostPermissionBroker {
    context: Context,
}

impl HostPermissionBroker {
    pub fn new(context: Context) -> Self {
        Self { context }
    }
}

impl PermissionBroker for HostPermissionBroker {
    fn request_transfer_permission(&self, identity: &DeviceIdentity) -> PermissionDecision {
        let Some(device) = find_device(&self.context, identity.bus_number, identity.device_address)
        else {
            debug!("device {} disappeared before permission check", identity);
            return PermissionDecision::Denied;
        };

        match device.open() {
            Ok(_handle) => PermissionDecision::Granted,
            Err(rusb::Error::Access) => {
                warn!("transfer access denied for {}", identity);
                PermissionDecision::Denied
            }
            Err(e) => {
                warn!("could not probe access for {}: {}", identity, e);
                PermissionDecision::Denied
            }
        }
    }
}
