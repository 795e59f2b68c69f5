//! rusb-backed control channel
//!
//! Implements [`ControlChannel`] on a libusb device handle with
//! vendor-class requests to the default control endpoint. The handle is
//! released when the channel drops, so classification's take-by-value
//! channel argument guarantees release on every exit path.

use aoap::{ControlChannel, ControlDirection, TransferError};
use rusb::{Context, DeviceHandle};
use std::time::Duration;
use tracing::trace;

/// Control channel over an open libusb handle.
pub struct RusbControlChannel {
    handle: DeviceHandle<Context>,
}

impl RusbControlChannel {
    pub fn new(handle: DeviceHandle<Context>) -> Self {
        Self { handle }
    }
}

impl ControlChannel for RusbControlChannel {
    fn query(
        &mut self,
        direction: ControlDirection,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> aoap::Result<usize> {
        trace!(
            "control transfer: direction={:?}, request={}, value={:#x}, index={:#x}, len={}",
            direction,
            request,
            value,
            index,
            buffer.len()
        );

        let transferred = match direction {
            ControlDirection::In => {
                let request_type = rusb::request_type(
                    rusb::Direction::In,
                    rusb::RequestType::Vendor,
                    rusb::Recipient::Device,
                );
                self.handle
                    .read_control(request_type, request, value, index, buffer, timeout)
            }
            ControlDirection::Out => {
                let request_type = rusb::request_type(
                    rusb::Direction::Out,
                    rusb::RequestType::Vendor,
                    rusb::Recipient::Device,
                );
                self.handle
                    .write_control(request_type, request, value, index, buffer, timeout)
            }
        }
        .map_err(map_rusb_error)?;

        if transferred < buffer.len() {
            return Err(TransferError::ShortTransfer {
                actual: transferred,
                expected: buffer.len(),
            });
        }

        Ok(transferred)
    }
}

/// Map rusb errors to the channel error taxonomy.
fn map_rusb_error(err: rusb::Error) -> TransferError {
    match err {
        rusb::Error::Timeout => TransferError::Timeout,
        rusb::Error::NoDevice | rusb::Error::NotFound => TransferError::ChannelClosed,
        other => TransferError::Failed(other.to_string()),
    }
}
