//! USB device access helpers
//!
//! Identity snapshots from rusb descriptors and the live-device channel
//! opener used by the orchestrator.

use crate::orchestrator::ChannelOpener;
use crate::usb::channel::RusbControlChannel;
use aoap::DeviceIdentity;
use common::{Error, Result};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, UsbContext};

const USB_CLASS_HUB: u8 = 9;

/// Bus-assigned device path, stable for one physical connection.
pub fn device_path(bus: u8, address: u8) -> String {
    format!("/dev/bus/usb/{:03}/{:03}", bus, address)
}

/// Take an identity snapshot of a device.
///
/// Opens the device temporarily to read the string descriptors; when
/// that fails (no access, device already gone) the strings are simply
/// absent, which every consumer tolerates.
pub fn snapshot_identity(
    device: &Device<Context>,
) -> std::result::Result<DeviceIdentity, rusb::Error> {
    let descriptor = device.device_descriptor()?;

    let strings = device
        .open()
        .ok()
        .and_then(|handle| read_string_descriptors(&descriptor, &handle));
    let (manufacturer, product, serial_number) = strings.unwrap_or((None, None, None));

    let bus_number = device.bus_number();
    let device_address = device.address();

    Ok(DeviceIdentity {
        vendor_id: descriptor.vendor_id(),
        product_id: descriptor.product_id(),
        serial_number,
        device_name: device_path(bus_number, device_address),
        manufacturer,
        product,
        bus_number,
        device_address,
    })
}

/// Whether the device is a hub (never a negotiation candidate).
pub fn is_hub(device: &Device<Context>) -> bool {
    device
        .device_descriptor()
        .map(|d| d.class_code() == USB_CLASS_HUB)
        .unwrap_or(false)
}

/// Find a live device by bus number and address.
pub fn find_device(context: &Context, bus: u8, address: u8) -> Option<Device<Context>> {
    context
        .devices()
        .ok()?
        .iter()
        .find(|d| d.bus_number() == bus && d.address() == address)
}

fn read_string_descriptors(
    descriptor: &DeviceDescriptor,
    handle: &DeviceHandle<Context>,
) -> Option<(Option<String>, Option<String>, Option<String>)> {
    let manufacturer = descriptor
        .manufacturer_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let product = descriptor
        .product_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    let serial_number = descriptor
        .serial_number_string_index()
        .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());

    Some((manufacturer, product, serial_number))
}

/// Opens control channels to live devices through libusb.
pub struct RusbOpener {
    context: Context,
}

impl RusbOpener {
    pub fn new(context: Context) -> Self {
        Self { context }
    }
}

impl ChannelOpener for RusbOpener {
    type Channel = RusbControlChannel;

    fn open_channel(&self, identity: &DeviceIdentity) -> Result<RusbControlChannel> {
        let device = find_device(&self.context, identity.bus_number, identity.device_address)
            .ok_or_else(|| Error::Usb(format!("device {} no longer present", identity)))?;

        let handle = device
            .open()
            .map_err(|e| Error::Usb(format!("failed to open {}: {}", identity, e)))?;

        Ok(RusbControlChannel::new(handle))
    }
}
