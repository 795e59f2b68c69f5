//! Attachment orchestration tests with scripted collaborators.
//!
//! The registry is the real SQLite store (in memory); the permission
//! broker and channel opener are scripted so each scenario controls
//! what the device on the other end does.

use aoap::test_utils::MockChannel;
use aoap::{DeviceIdentity, TransferError};
use common::{AttachmentEvent, Error};
use host::orchestrator::{AttachmentOrchestrator, ChannelOpener};
use host::permission::{PermissionBroker, PermissionDecision};
use host::registry::{DeviceRegistry, RegistryRecord, SqliteRegistry};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

struct ScriptedBroker {
    decisions: RefCell<VecDeque<PermissionDecision>>,
    requests: Cell<usize>,
}

impl ScriptedBroker {
    /// Grants every request.
    fn granting() -> Self {
        Self::scripted([])
    }

    /// Plays back the given decisions in order, then grants.
    fn scripted(decisions: impl IntoIterator<Item = PermissionDecision>) -> Self {
        Self {
            decisions: RefCell::new(decisions.into_iter().collect()),
            requests: Cell::new(0),
        }
    }

    fn request_count(&self) -> usize {
        self.requests.get()
    }
}

impl PermissionBroker for ScriptedBroker {
    fn request_transfer_permission(&self, _identity: &DeviceIdentity) -> PermissionDecision {
        self.requests.set(self.requests.get() + 1);
        self.decisions
            .borrow_mut()
            .pop_front()
            .unwrap_or(PermissionDecision::Granted)
    }
}

struct ScriptedOpener {
    channels: RefCell<VecDeque<MockChannel>>,
    opens: Cell<usize>,
}

impl ScriptedOpener {
    fn with_channels(channels: impl IntoIterator<Item = MockChannel>) -> Self {
        Self {
            channels: RefCell::new(channels.into_iter().collect()),
            opens: Cell::new(0),
        }
    }

    /// Opener for scenarios where no channel should ever be opened.
    fn unreachable() -> Self {
        Self::with_channels([])
    }

    fn open_count(&self) -> usize {
        self.opens.get()
    }
}

impl ChannelOpener for ScriptedOpener {
    type Channel = MockChannel;

    fn open_channel(&self, identity: &DeviceIdentity) -> common::Result<MockChannel> {
        self.opens.set(self.opens.get() + 1);
        self.channels
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| Error::Usb(format!("no scripted channel for {}", identity)))
    }
}

fn orchestrator(
    broker: ScriptedBroker,
    opener: ScriptedOpener,
) -> AttachmentOrchestrator<SqliteRegistry, ScriptedBroker, ScriptedOpener> {
    AttachmentOrchestrator::new(
        SqliteRegistry::in_memory().unwrap(),
        broker,
        opener,
        aoap::AccessoryStrings::default(),
    )
}

fn phone(serial: &str, path: &str) -> DeviceIdentity {
    DeviceIdentity {
        serial_number: Some(serial.to_string()),
        ..DeviceIdentity::new(0x04E8, 0x6860, path)
    }
}

fn attach(identity: &DeviceIdentity) -> AttachmentEvent {
    AttachmentEvent::Attached {
        identity: identity.clone(),
    }
}

fn detach(identity: &DeviceIdentity) -> AttachmentEvent {
    AttachmentEvent::Detached {
        identity: identity.clone(),
    }
}

fn stored_type(
    orch: &AttachmentOrchestrator<SqliteRegistry, ScriptedBroker, ScriptedOpener>,
    identity: &DeviceIdentity,
) -> String {
    orch.registry()
        .lookup(&identity.key())
        .unwrap()
        .unwrap()
        .device_type
        .clone()
}

#[test]
fn test_first_attach_negotiates_and_records() {
    let mut orch = orchestrator(
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([MockChannel::supporting(2)]),
    );
    let device = phone("SER1", "/dev/bus/usb/001/004");

    orch.handle_event(attach(&device));

    assert_eq!(stored_type(&orch, &device), "negotiated");
    assert_eq!(orch.in_flight_count(), 1);
}

#[test]
fn test_carplay_companion_needs_no_handshake() {
    let opener = ScriptedOpener::with_channels([MockChannel::stalled()]);
    let mut orch = orchestrator(ScriptedBroker::granting(), opener);
    let iphone = DeviceIdentity::new(1452, 4776, "/dev/bus/usb/002/003");

    orch.handle_event(attach(&iphone));

    // Resolved from the descriptor alone; the stalled channel was
    // opened but never queried.
    assert_eq!(stored_type(&orch, &iphone), "carplay");
}

#[test]
fn test_accessory_mode_product_id_recorded_as_active() {
    let mut orch = orchestrator(
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([MockChannel::stalled()]),
    );
    let device = DeviceIdentity::new(0x18D1, 0x2D01, "/dev/bus/usb/001/009");

    orch.handle_event(attach(&device));

    assert_eq!(stored_type(&orch, &device), "accessory");
}

#[test]
fn test_permission_denied_leaves_record_unclassified() {
    let mut orch = orchestrator(
        ScriptedBroker::scripted([PermissionDecision::Denied]),
        ScriptedOpener::unreachable(),
    );
    let device = phone("SER2", "/dev/bus/usb/001/004");

    orch.handle_event(attach(&device));

    assert_eq!(stored_type(&orch, &device), "NA");
    assert_eq!(orch.opener().open_count(), 0);
    assert_eq!(orch.in_flight_count(), 1);
}

#[test]
fn test_duplicate_attach_for_busy_slot_ignored() {
    let mut orch = orchestrator(
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([MockChannel::supporting(2)]),
    );
    let device = phone("SER3", "/dev/bus/usb/001/004");

    orch.handle_event(attach(&device));
    orch.handle_event(attach(&device));

    assert_eq!(orch.permissions().request_count(), 1);
    assert_eq!(orch.registry().list_all().unwrap().len(), 1);
}

#[test]
fn test_detach_clears_slot_and_allows_retry() {
    // First attempt denied, second granted after a re-plug.
    let mut orch = orchestrator(
        ScriptedBroker::scripted([PermissionDecision::Denied, PermissionDecision::Granted]),
        ScriptedOpener::with_channels([MockChannel::supporting(2)]),
    );
    let device = phone("SER4", "/dev/bus/usb/001/004");

    orch.handle_event(attach(&device));
    assert_eq!(stored_type(&orch, &device), "NA");

    orch.handle_event(detach(&device));
    assert_eq!(orch.in_flight_count(), 0);

    orch.handle_event(attach(&device));
    assert_eq!(stored_type(&orch, &device), "negotiated");
    assert_eq!(orch.permissions().request_count(), 2);
}

#[test]
fn test_known_device_gets_timestamp_refresh_only() {
    let registry = SqliteRegistry::in_memory().unwrap();
    let device = phone("SER5", "/dev/bus/usb/001/004");
    registry.insert(&RegistryRecord::new(&device)).unwrap();
    registry
        .update_type(&device.key(), aoap::ClassificationResult::Unsupported)
        .unwrap();

    let mut orch = AttachmentOrchestrator::new(
        registry,
        ScriptedBroker::granting(),
        ScriptedOpener::unreachable(),
        aoap::AccessoryStrings::default(),
    );

    orch.handle_event(attach(&device));

    // No permission request, no channel, type untouched.
    assert_eq!(orch.permissions().request_count(), 0);
    assert_eq!(orch.opener().open_count(), 0);
    assert_eq!(stored_type(&orch, &device), "unsupported");
}

#[test]
fn test_unclassified_record_retries_on_reattach() {
    let registry = SqliteRegistry::in_memory().unwrap();
    let device = phone("SER6", "/dev/bus/usb/001/004");
    registry.insert(&RegistryRecord::new(&device)).unwrap();

    let mut orch = AttachmentOrchestrator::new(
        registry,
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([MockChannel::supporting(2)]),
        aoap::AccessoryStrings::default(),
    );

    orch.handle_event(attach(&device));

    assert_eq!(stored_type(&orch, &device), "negotiated");
}

#[test]
fn test_start_failure_records_unknown() {
    let mut failing = MockChannel::supporting(2);
    failing.fail_start(TransferError::Timeout);

    let mut orch = orchestrator(
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([failing]),
    );
    let device = phone("SER7", "/dev/bus/usb/001/004");

    orch.handle_event(attach(&device));

    assert_eq!(stored_type(&orch, &device), "unknown");
}

#[test]
fn test_version_zero_records_unsupported() {
    let mut orch = orchestrator(
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([MockChannel::supporting(0)]),
    );
    let device = phone("SER8", "/dev/bus/usb/001/004");

    orch.handle_event(attach(&device));

    assert_eq!(stored_type(&orch, &device), "unsupported");
}

#[test]
fn test_open_failure_is_not_fatal() {
    let mut orch = orchestrator(ScriptedBroker::granting(), ScriptedOpener::unreachable());
    let unplugged = phone("SER9", "/dev/bus/usb/001/004");
    let next = phone("SER10", "/dev/bus/usb/001/005");

    orch.handle_event(attach(&unplugged));
    assert_eq!(stored_type(&orch, &unplugged), "NA");

    // The orchestrator must still process the next attachment.
    let mut orch = orchestrator(
        ScriptedBroker::granting(),
        ScriptedOpener::with_channels([MockChannel::supporting(2)]),
    );
    orch.handle_event(attach(&next));
    assert_eq!(stored_type(&orch, &next), "negotiated");
}

#[test]
fn test_detach_of_unknown_slot_is_harmless() {
    let mut orch = orchestrator(ScriptedBroker::granting(), ScriptedOpener::unreachable());
    let device = phone("SER11", "/dev/bus/usb/001/004");

    orch.handle_event(detach(&device));
    assert_eq!(orch.in_flight_count(), 0);
    assert!(orch.registry().list_all().unwrap().is_empty());
}
