//! USB hotplug monitor thread
//!
//! Dedicated thread running the libusb event loop. Initial enumeration
//! and hot-plug callbacks are both forwarded as identity-carrying
//! attachment events over the async channel bridge; the loop polls for
//! a shutdown command between event rounds.

use crate::usb::device::{is_hub, snapshot_identity};
use common::{AttachmentEvent, MonitorCommand, UsbWorker};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::time::Duration;
use tracing::{debug, error, info, warn};

struct HotplugCallback {
    event_tx: async_channel::Sender<AttachmentEvent>,
}

impl HotplugCallback {
    fn forward(&self, device: &Device<Context>, make: fn(aoap::DeviceIdentity) -> AttachmentEvent) {
        if is_hub(device) {
            debug!(
                "hub at bus={} addr={} ignored",
                device.bus_number(),
                device.address()
            );
            return;
        }

        match snapshot_identity(device) {
            Ok(identity) => {
                if let Err(e) = self.event_tx.send_blocking(make(identity)) {
                    error!("failed to forward hotplug event: {}", e);
                }
            }
            Err(e) => warn!("failed to read descriptors of hotplugged device: {}", e),
        }
    }
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        self.forward(&device, |identity| AttachmentEvent::Attached { identity });
    }

    fn device_left(&mut self, device: Device<Context>) {
        self.forward(&device, |identity| AttachmentEvent::Detached { identity });
    }
}

/// USB monitor thread state.
pub struct UsbMonitor {
    context: Context,
    worker: UsbWorker,
    _hotplug_registration: Option<Registration<Context>>,
}

impl UsbMonitor {
    pub fn new(context: Context, worker: UsbWorker) -> Self {
        Self {
            context,
            worker,
            _hotplug_registration: None,
        }
    }

    /// Enumerate devices already on the bus and register hot-plug
    /// callbacks. Call once before `run`.
    pub fn initialize(&mut self) -> Result<(), rusb::Error> {
        self.enumerate_existing()?;
        self.register_hotplug()?;
        info!("USB monitor initialized");
        Ok(())
    }

    fn enumerate_existing(&self) -> Result<(), rusb::Error> {
        let mut forwarded = 0;
        for device in self.context.devices()?.iter() {
            if is_hub(&device) {
                continue;
            }
            match snapshot_identity(&device) {
                Ok(identity) => {
                    debug!("enumerated {}", identity);
                    if let Err(e) = self
                        .worker
                        .event_tx
                        .send_blocking(AttachmentEvent::Attached { identity })
                    {
                        error!("failed to forward enumerated device: {}", e);
                    } else {
                        forwarded += 1;
                    }
                }
                Err(e) => warn!("failed to read descriptors during enumeration: {}", e),
            }
        }
        debug!("enumerated {} candidate devices", forwarded);
        Ok(())
    }

    fn register_hotplug(&mut self) -> Result<(), rusb::Error> {
        let callback = HotplugCallback {
            event_tx: self.worker.event_tx.clone(),
        };

        let registration = HotplugBuilder::new()
            .enumerate(false) // initial scan already done
            .register(&self.context, Box::new(callback))?;

        self._hotplug_registration = Some(registration);
        debug!("hot-plug callbacks registered");
        Ok(())
    }

    /// Run the monitor event loop until a shutdown command arrives.
    pub fn run(mut self) {
        info!("USB monitor thread started");

        loop {
            if let Some(MonitorCommand::Shutdown) = self.worker.try_recv_command() {
                info!("USB monitor shutting down");
                break;
            }

            match self.context.handle_events(Some(Duration::from_millis(100))) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("USB event handling interrupted");
                }
                Err(e) => {
                    warn!("error handling USB events: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }

        self._hotplug_registration = None;
        info!("USB monitor thread stopped");
    }
}

/// Initialize a monitor and spawn its event loop on a dedicated thread.
pub fn spawn_usb_monitor(
    context: Context,
    worker: UsbWorker,
) -> Result<std::thread::JoinHandle<()>, rusb::Error> {
    let mut monitor = UsbMonitor::new(context, worker);
    monitor.initialize()?;
    Ok(std::thread::spawn(move || monitor.run()))
}
