//! USB subsystem
//!
//! rusb-backed device access: identity snapshots, the control channel
//! used by the handshake, and the hotplug monitor thread.

pub mod channel;
pub mod device;
pub mod monitor;

pub use channel::RusbControlChannel;
pub use device::{RusbOpener, device_path, find_device, snapshot_identity};
pub use monitor::{UsbMonitor, spawn_usb_monitor};
