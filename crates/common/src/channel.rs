//! Async channel bridge between the USB monitor thread and the rest of
//! the system
//!
//! USB work runs on a dedicated blocking thread (libusb event loop);
//! everything it observes is forwarded as explicit [`AttachmentEvent`]s
//! carrying the full device identity, so no state is captured
//! implicitly in callbacks.

use aoap::DeviceIdentity;
use async_channel::{Receiver, Sender, bounded};

/// Events consumed by the attachment orchestrator.
#[derive(Debug, Clone)]
pub enum AttachmentEvent {
    /// A device appeared on the bus.
    Attached { identity: DeviceIdentity },
    /// A device left the bus.
    Detached { identity: DeviceIdentity },
    /// Result of a transfer-permission request, correlated by identity.
    Permission {
        identity: DeviceIdentity,
        granted: bool,
    },
}

/// Commands to the USB monitor thread.
#[derive(Debug)]
pub enum MonitorCommand {
    /// Stop the monitor event loop.
    Shutdown,
}

/// Handle held by the async side (main task).
#[derive(Debug, Clone)]
pub struct UsbBridge {
    pub command_tx: Sender<MonitorCommand>,
    pub event_rx: Receiver<AttachmentEvent>,
}

/// Handle held by the USB monitor thread.
#[derive(Debug)]
pub struct UsbWorker {
    pub command_rx: Receiver<MonitorCommand>,
    pub event_tx: Sender<AttachmentEvent>,
}

impl UsbWorker {
    /// Non-blocking command poll for the monitor loop.
    pub fn try_recv_command(&self) -> Option<MonitorCommand> {
        self.command_rx.try_recv().ok()
    }
}

/// Create the bridge pair connecting the monitor thread and the
/// orchestrator.
pub fn create_usb_bridge() -> (UsbBridge, UsbWorker) {
    let (command_tx, command_rx) = bounded(16);
    let (event_tx, event_rx) = bounded(64);

    (
        UsbBridge {
            command_tx,
            event_rx,
        },
        UsbWorker {
            command_rx,
            event_tx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_flow_across_the_bridge() {
        let (bridge, worker) = create_usb_bridge();

        let identity = DeviceIdentity::new(0x18D1, 0x2D00, "/dev/bus/usb/001/002");
        worker
            .event_tx
            .send_blocking(AttachmentEvent::Attached {
                identity: identity.clone(),
            })
            .unwrap();

        match bridge.event_rx.recv_blocking().unwrap() {
            AttachmentEvent::Attached { identity: got } => assert_eq!(got, identity),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_command_polled() {
        let (bridge, worker) = create_usb_bridge();
        assert!(worker.try_recv_command().is_none());

        bridge
            .command_tx
            .send_blocking(MonitorCommand::Shutdown)
            .unwrap();
        assert!(matches!(
            worker.try_recv_command(),
            Some(MonitorCommand::Shutdown)
        ));
    }
}
