//! Common utilities for aoap-host
//!
//! Shared plumbing between the USB monitor thread and the attachment
//! orchestrator: error types, logging setup, and the async channel
//! bridge carrying attachment events.

pub mod channel;
pub mod error;
pub mod logging;

pub use channel::{AttachmentEvent, MonitorCommand, UsbBridge, UsbWorker, create_usb_bridge};
pub use error::{Error, Result};
pub use logging::setup_logging;
