//! aoap-host library
//!
//! Host-side pieces of the accessory negotiation daemon: configuration,
//! the persistent device registry, the permission broker, the rusb
//! monitor thread, and the attachment orchestrator that ties them
//! together. The binary in `main.rs` wires these up; integration tests
//! exercise them directly.

pub mod config;
pub mod orchestrator;
pub mod permission;
pub mod registry;
pub mod usb;

pub use config::HostConfig;
pub use orchestrator::{AttachmentOrchestrator, ChannelOpener};
pub use permission::{PermissionBroker, PermissionDecision};
pub use registry::{DeviceRegistry, RegistryRecord, SqliteRegistry};
