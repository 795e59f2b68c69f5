//! Control-transfer channel abstraction
//!
//! A [`ControlChannel`] is a bidirectional vendor control-transfer
//! endpoint to one physical device. The host binary implements it on a
//! libusb device handle; tests implement it with a scripted channel.

use crate::error::Result;
use std::time::Duration;

/// Transfer direction for a control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlDirection {
    /// Device to host.
    In,
    /// Host to device.
    Out,
}

/// One vendor-class control-transfer endpoint.
///
/// Contract for implementations:
/// - the call blocks at most `timeout` before returning
///   [`TransferError::Timeout`](crate::TransferError::Timeout);
/// - for [`ControlDirection::In`] the response is written into `buffer`,
///   for [`ControlDirection::Out`] `buffer` holds the payload to send;
/// - a transfer that moves fewer bytes than `buffer.len()` must be
///   reported as [`TransferError::ShortTransfer`](crate::TransferError::ShortTransfer),
///   never as success.
pub trait ControlChannel {
    /// Perform one vendor control transfer, returning the byte count moved.
    fn query(
        &mut self,
        direction: ControlDirection,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize>;
}

impl<C: ControlChannel + ?Sized> ControlChannel for &mut C {
    fn query(
        &mut self,
        direction: ControlDirection,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize> {
        (**self).query(direction, request, value, index, buffer, timeout)
    }
}
