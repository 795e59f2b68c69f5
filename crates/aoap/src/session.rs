//! Ephemeral handshake session state
//!
//! A [`HandshakeSession`] is scoped to one control channel. It records
//! the queried protocol version, which identifying strings have been
//! sent, and whether the start command was issued. It is never
//! persisted; it is discarded when the channel closes or the device
//! re-enumerates.

/// Number of identifying string slots in the handshake.
pub const STRING_SLOT_COUNT: usize = 6;

/// Identifying string slot numbers.
///
/// The slot numbers are part of the wire contract; the order the
/// strings are sent in is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringSlot {
    Manufacturer,
    Model,
    Description,
    Version,
    Uri,
    Serial,
}

impl StringSlot {
    /// All slots, in the order the handshake sends them.
    pub const ALL: [StringSlot; STRING_SLOT_COUNT] = [
        StringSlot::Manufacturer,
        StringSlot::Model,
        StringSlot::Description,
        StringSlot::Version,
        StringSlot::Uri,
        StringSlot::Serial,
    ];

    /// Wire value for the control transfer `index` parameter.
    pub fn index(self) -> u16 {
        match self {
            StringSlot::Manufacturer => 0,
            StringSlot::Model => 1,
            StringSlot::Description => 2,
            StringSlot::Version => 3,
            StringSlot::Uri => 4,
            StringSlot::Serial => 5,
        }
    }
}

/// Phase of the handshake state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// No transfer issued yet.
    Idle,
    /// Version query answered with a supported version.
    VersionQueried,
    /// Version query reported 0; terminal.
    Unsupported,
    /// All six identifying strings have been sent.
    StringsSent,
    /// Start command issued; terminal.
    Started,
}

/// Per-channel handshake state.
#[derive(Debug, Default)]
pub struct HandshakeSession {
    version: Option<u16>,
    sent: Vec<StringSlot>,
    start_issued: bool,
}

impl HandshakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protocol version, 0 meaning "not accessory-capable or query failed".
    pub fn version(&self) -> u16 {
        self.version.unwrap_or(0)
    }

    /// String slots sent so far, in send order.
    pub fn strings_sent(&self) -> &[StringSlot] {
        &self.sent
    }

    pub fn all_strings_sent(&self) -> bool {
        StringSlot::ALL.iter().all(|slot| self.sent.contains(slot))
    }

    pub fn start_issued(&self) -> bool {
        self.start_issued
    }

    pub fn phase(&self) -> HandshakePhase {
        if self.start_issued {
            HandshakePhase::Started
        } else if self.all_strings_sent() {
            HandshakePhase::StringsSent
        } else {
            match self.version {
                None => HandshakePhase::Idle,
                Some(0) => HandshakePhase::Unsupported,
                Some(_) => HandshakePhase::VersionQueried,
            }
        }
    }

    pub(crate) fn record_version(&mut self, version: u16) {
        self.version = Some(version);
    }

    pub(crate) fn record_string_sent(&mut self, slot: StringSlot) {
        if !self.sent.contains(&slot) {
            self.sent.push(slot);
        }
    }

    pub(crate) fn record_start(&mut self) {
        self.start_issued = true;
    }
}
