//! Scripted control channel for handshake tests
//!
//! [`MockChannel`] answers the three accessory requests from a small
//! behaviour table and records every transfer it sees, so tests can
//! assert both outcomes and wire traffic. Pass it as `&mut channel`
//! to keep it inspectable after [`classify`](crate::classify) consumes
//! the channel argument.

use crate::channel::{ControlChannel, ControlDirection};
use crate::consts::{REQUEST_GET_PROTOCOL, REQUEST_SEND_STRING, REQUEST_START};
use crate::error::{Result, TransferError};
use std::collections::HashMap;
use std::time::Duration;

/// One recorded control transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransfer {
    pub direction: ControlDirection,
    pub request: u8,
    pub value: u16,
    pub index: u16,
    /// Payload bytes for OUT transfers, empty for IN.
    pub data: Vec<u8>,
}

/// Scripted in-memory [`ControlChannel`].
#[derive(Debug, Default)]
pub struct MockChannel {
    /// Response bytes for the version query; `None` stalls the request.
    version_bytes: Option<Vec<u8>>,
    /// Per-slot failures for string sends, keyed by wire index.
    failing_slots: HashMap<u16, TransferError>,
    /// Failure for the start command, if any.
    start_error: Option<TransferError>,
    log: Vec<RecordedTransfer>,
}

impl MockChannel {
    /// A device reporting the given protocol version.
    pub fn supporting(version: u16) -> Self {
        Self::with_version_bytes(version.to_le_bytes().to_vec())
    }

    /// A device answering the version query with exactly these bytes.
    pub fn with_version_bytes(bytes: Vec<u8>) -> Self {
        Self {
            version_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// A device that stalls the version query.
    pub fn stalled() -> Self {
        Self::default()
    }

    /// Make the string send for `slot_index` fail with `error`.
    pub fn fail_string_slot(&mut self, slot_index: u16, error: TransferError) {
        self.failing_slots.insert(slot_index, error);
    }

    /// Make the start command fail with `error`.
    pub fn fail_start(&mut self, error: TransferError) {
        self.start_error = Some(error);
    }

    /// Number of control transfers issued so far.
    pub fn transfer_count(&self) -> usize {
        self.log.len()
    }

    /// Every transfer issued so far, in order.
    pub fn transfer_log(&self) -> &[RecordedTransfer] {
        &self.log
    }

    /// Payload of the string send for `slot_index`, if one was issued.
    pub fn sent_payload(&self, slot_index: u16) -> Option<Vec<u8>> {
        self.log
            .iter()
            .find(|t| t.request == REQUEST_SEND_STRING && t.index == slot_index)
            .map(|t| t.data.clone())
    }
}

impl ControlChannel for MockChannel {
    fn query(
        &mut self,
        direction: ControlDirection,
        request: u8,
        value: u16,
        index: u16,
        buffer: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize> {
        self.log.push(RecordedTransfer {
            direction,
            request,
            value,
            index,
            data: match direction {
                ControlDirection::Out => buffer.to_vec(),
                ControlDirection::In => Vec::new(),
            },
        });

        match request {
            REQUEST_GET_PROTOCOL => match &self.version_bytes {
                Some(bytes) => {
                    let n = bytes.len().min(buffer.len());
                    buffer[..n].copy_from_slice(&bytes[..n]);
                    if n < buffer.len() {
                        Err(TransferError::ShortTransfer {
                            actual: n,
                            expected: buffer.len(),
                        })
                    } else {
                        Ok(n)
                    }
                }
                None => Err(TransferError::Failed("endpoint stalled".to_string())),
            },
            REQUEST_SEND_STRING => match self.failing_slots.get(&index) {
                Some(error) => Err(error.clone()),
                None => Ok(buffer.len()),
            },
            REQUEST_START => match &self.start_error {
                Some(error) => Err(error.clone()),
                None => Ok(0),
            },
            other => Err(TransferError::Failed(format!(
                "unexpected request code {}",
                other
            ))),
        }
    }
}
