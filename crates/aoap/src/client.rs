//! Accessory protocol handshake client
//!
//! Drives the three vendor control requests (version query, string
//! push, start) over one [`ControlChannel`], tracking progress in a
//! [`HandshakeSession`]. All transfer errors are absorbed here: the
//! version query degrades to "unsupported", string sends degrade to
//! collected warnings, and only the start command surfaces its error to
//! the caller.

use crate::channel::{ControlChannel, ControlDirection};
use crate::consts::{REQUEST_GET_PROTOCOL, REQUEST_SEND_STRING, REQUEST_START, TRANSFER_TIMEOUT};
use crate::error::TransferError;
use crate::session::{HandshakeSession, StringSlot};
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

/// Non-fatal failure while pushing one identifying string.
///
/// The protocol tolerates missing optional strings, so a failed send
/// does not abort the handshake; it is collected so callers and tests
/// can assert on partial-failure handshakes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringSendWarning {
    pub slot: StringSlot,
    pub error: TransferError,
}

/// Handshake client over one control channel.
pub struct AccessoryProtocolClient<C: ControlChannel> {
    channel: C,
    session: HandshakeSession,
    warnings: Vec<StringSendWarning>,
}

impl<C: ControlChannel> AccessoryProtocolClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            session: HandshakeSession::new(),
            warnings: Vec::new(),
        }
    }

    /// Query the accessory protocol version (request 51).
    ///
    /// Expects exactly 2 response bytes, combined little-endian:
    /// `version = (hi << 8) | lo`. Anything other than exactly 2 bytes
    /// transferred, including transport errors, yields 0 ("not an
    /// accessory-capable device").
    pub fn query_protocol_version(&mut self) -> u16 {
        let mut buffer = [0u8; 2];

        let version = match self.channel.query(
            ControlDirection::In,
            REQUEST_GET_PROTOCOL,
            0,
            0,
            &mut buffer,
            TRANSFER_TIMEOUT,
        ) {
            Ok(2) => LittleEndian::read_u16(&buffer),
            Ok(len) => {
                warn!("protocol version query moved {} bytes, expected 2", len);
                0
            }
            Err(e) => {
                warn!("protocol version query failed: {}", e);
                0
            }
        };

        debug!("accessory protocol version: {}", version);
        self.session.record_version(version);
        version
    }

    /// Whether the device speaks a usable accessory protocol version.
    pub fn is_supported(&mut self) -> bool {
        self.query_protocol_version() >= 1
    }

    /// Push one identifying string (request 52).
    ///
    /// The payload is the UTF-8 bytes of `text` followed by a single NUL
    /// terminator. A transfer-count mismatch is recorded as a warning
    /// and the handshake continues.
    pub fn send_identifying_string(&mut self, slot: StringSlot, text: &str) {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        let expected = payload.len();

        match self.channel.query(
            ControlDirection::Out,
            REQUEST_SEND_STRING,
            0,
            slot.index(),
            &mut payload,
            TRANSFER_TIMEOUT,
        ) {
            Ok(len) if len == expected => {
                debug!("sent identifying string {:?} ({} bytes)", slot, len);
            }
            Ok(len) => {
                warn!(
                    "identifying string {:?} truncated: {} of {} bytes",
                    slot, len, expected
                );
                self.warnings.push(StringSendWarning {
                    slot,
                    error: TransferError::ShortTransfer {
                        actual: len,
                        expected,
                    },
                });
            }
            Err(error) => {
                warn!("failed to send identifying string {:?}: {}", slot, error);
                self.warnings.push(StringSendWarning { slot, error });
            }
        }

        self.session.record_string_sent(slot);
    }

    /// Issue the accessory start command (request 53, empty payload).
    ///
    /// Terminal action: on success the device is expected to disconnect
    /// and re-enumerate under an accessory product ID. There is no
    /// retry; a failure is reported to the caller.
    pub fn start(&mut self) -> Result<(), TransferError> {
        match self.channel.query(
            ControlDirection::Out,
            REQUEST_START,
            0,
            0,
            &mut [],
            TRANSFER_TIMEOUT,
        ) {
            Ok(_) => {
                debug!("accessory start command issued");
                self.session.record_start();
                Ok(())
            }
            Err(e) => {
                warn!("accessory start command failed: {}", e);
                Err(e)
            }
        }
    }

    /// Handshake state so far.
    pub fn session(&self) -> &HandshakeSession {
        &self.session
    }

    /// Warnings collected from best-effort string sends.
    pub fn warnings(&self) -> &[StringSendWarning] {
        &self.warnings
    }

    /// Consume the client, releasing the channel and keeping the warnings.
    pub fn into_warnings(self) -> Vec<StringSendWarning> {
        self.warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::HandshakePhase;
    use crate::test_utils::MockChannel;

    #[test]
    fn test_version_combined_little_endian() {
        // lo = 0x02, hi = 0x01 -> 0x0102
        let mut channel = MockChannel::with_version_bytes(vec![0x02, 0x01]);
        let mut client = AccessoryProtocolClient::new(&mut channel);
        assert_eq!(client.query_protocol_version(), 0x0102);
    }

    #[test]
    fn test_version_all_byte_pairs_sampled() {
        for (lo, hi) in [(0u8, 0u8), (1, 0), (0, 1), (0xFF, 0xFF), (0x34, 0x12)] {
            let mut channel = MockChannel::with_version_bytes(vec![lo, hi]);
            let mut client = AccessoryProtocolClient::new(&mut channel);
            assert_eq!(
                client.query_protocol_version(),
                ((hi as u16) << 8) | lo as u16
            );
        }
    }

    #[test]
    fn test_short_version_response_means_unsupported() {
        let mut channel = MockChannel::with_version_bytes(vec![0x02]);
        let mut client = AccessoryProtocolClient::new(&mut channel);
        assert_eq!(client.query_protocol_version(), 0);
        assert!(!client.is_supported());
    }

    #[test]
    fn test_version_query_error_means_unsupported() {
        let mut channel = MockChannel::stalled();
        let mut client = AccessoryProtocolClient::new(&mut channel);
        assert_eq!(client.query_protocol_version(), 0);
        assert_eq!(client.session().phase(), HandshakePhase::Unsupported);
    }

    #[test]
    fn test_is_supported_boundary() {
        let mut channel = MockChannel::supporting(1);
        assert!(AccessoryProtocolClient::new(&mut channel).is_supported());

        let mut channel = MockChannel::supporting(0);
        assert!(!AccessoryProtocolClient::new(&mut channel).is_supported());
    }

    #[test]
    fn test_string_payload_nul_terminated() {
        let mut channel = MockChannel::supporting(2);
        {
            let mut client = AccessoryProtocolClient::new(&mut channel);
            client.send_identifying_string(StringSlot::Model, "Model");
        }
        let sent = channel.sent_payload(StringSlot::Model.index()).unwrap();
        assert_eq!(sent, b"Model\0");
    }

    #[test]
    fn test_string_send_failure_collected_not_fatal() {
        let mut channel = MockChannel::supporting(2);
        channel.fail_string_slot(StringSlot::Uri.index(), TransferError::Timeout);
        {
            let mut client = AccessoryProtocolClient::new(&mut channel);
            client.send_identifying_string(StringSlot::Uri, "https://example.com");
            assert_eq!(client.warnings().len(), 1);
            assert_eq!(client.warnings()[0].slot, StringSlot::Uri);
            // The slot still counts as sent; the handshake continues.
            assert_eq!(client.session().strings_sent(), &[StringSlot::Uri]);
        }
    }

    #[test]
    fn test_start_success_with_zero_bytes() {
        // Empty payload: zero transferred bytes is success.
        let mut channel = MockChannel::supporting(2);
        let mut client = AccessoryProtocolClient::new(&mut channel);
        assert!(client.start().is_ok());
        assert!(client.session().start_issued());
    }

    #[test]
    fn test_start_failure_reported() {
        let mut channel = MockChannel::supporting(2);
        channel.fail_start(TransferError::ChannelClosed);
        let mut client = AccessoryProtocolClient::new(&mut channel);
        assert_eq!(client.start(), Err(TransferError::ChannelClosed));
        assert!(!client.session().start_issued());
    }
}
