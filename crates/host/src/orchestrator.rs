//! Attachment orchestrator
//!
//! Top-level state machine per physical attachment event. Sequences
//! permission acquisition, registry lookup, classification, and the
//! registry update; consumes explicit [`AttachmentEvent`]s so all
//! correlation is by device identity, never by captured callback state.
//!
//! One attachment is processed as an uninterrupted sequence. At most
//! one attachment-classification sequence is in flight per bus slot
//! (device path); a duplicate attach for a busy slot is ignored until a
//! matching detach clears the flag. No transfer or registry error is
//! fatal here: the orchestrator must always be able to process the next
//! attachment.
//!
//! Events are consumed on a single thread, so classification for one
//! slot runs to completion before the next attachment is looked at. A
//! misbehaving device can hold the loop for its handshake's transfer
//! timeouts (2 s each), delaying other slots by that much at worst;
//! attachments are never dropped, only queued on the event channel.

use crate::permission::{PermissionBroker, PermissionDecision};
use crate::registry::{DeviceRegistry, RegistryRecord};
use aoap::{AccessoryStrings, ControlChannel, DeviceIdentity, classify};
use async_channel::Receiver;
use common::{AttachmentEvent, Result};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Opens a control channel to a live device.
///
/// Split out so tests can hand the orchestrator scripted channels.
pub trait ChannelOpener {
    type Channel: ControlChannel;

    fn open_channel(&self, identity: &DeviceIdentity) -> Result<Self::Channel>;
}

/// Progress of one in-flight attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// Waiting for the permission decision.
    AwaitingPermission,
    /// Orchestration for this attachment has finished; the slot stays
    /// occupied until the matching detach.
    Complete,
}

/// Per-attachment orchestration over an explicitly passed registry.
pub struct AttachmentOrchestrator<R, P, O> {
    registry: R,
    permissions: P,
    opener: O,
    accessory: AccessoryStrings,
    /// In-flight attachments, keyed by bus slot (device path).
    in_flight: HashMap<String, AttachmentState>,
}

impl<R, P, O> AttachmentOrchestrator<R, P, O>
where
    R: DeviceRegistry,
    P: PermissionBroker,
    O: ChannelOpener,
{
    pub fn new(registry: R, permissions: P, opener: O, accessory: AccessoryStrings) -> Self {
        Self {
            registry,
            permissions,
            opener,
            accessory,
            in_flight: HashMap::new(),
        }
    }

    /// Consume events until every sender is gone.
    pub fn run(mut self, events: Receiver<AttachmentEvent>) {
        info!("attachment orchestrator started");
        while let Ok(event) = events.recv_blocking() {
            self.handle_event(event);
        }
        info!("attachment orchestrator stopped");
    }

    pub fn handle_event(&mut self, event: AttachmentEvent) {
        match event {
            AttachmentEvent::Attached { identity } => self.handle_attached(identity),
            AttachmentEvent::Detached { identity } => self.handle_detached(&identity),
            AttachmentEvent::Permission { identity, granted } => {
                self.handle_permission(identity, granted)
            }
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn permissions(&self) -> &P {
        &self.permissions
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Number of slots with an attachment in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    fn handle_attached(&mut self, identity: DeviceIdentity) {
        let slot = identity.device_name.clone();
        if self.in_flight.contains_key(&slot) {
            debug!("duplicate attachment for {} ignored", identity);
            return;
        }

        info!("device attached: {}", identity);
        let key = identity.key();

        let needs_classification = match self.registry.lookup(&key) {
            Ok(Some(record)) => {
                match self.registry.update_timestamp(&key) {
                    Ok(rows) if rows > 0 => debug!("attachment time updated for {}", key),
                    Ok(_) => warn!("no registry row matched key {} for timestamp update", key),
                    Err(e) => error!("failed to update attachment time for {}: {}", key, e),
                }
                // A device with a resolved stored type only gets the
                // timestamp refresh; an unclassified record retries.
                record.is_unclassified()
            }
            Ok(None) => match self.registry.insert(&RegistryRecord::new(&identity)) {
                Ok(()) => {
                    info!("device {} added to the registry", key);
                    true
                }
                Err(e) => {
                    error!("failed to insert {} into the registry: {}", key, e);
                    false
                }
            },
            Err(e) => {
                error!("registry lookup failed for {}: {}", key, e);
                false
            }
        };

        if needs_classification {
            self.in_flight
                .insert(slot, AttachmentState::AwaitingPermission);
            let decision = self.permissions.request_transfer_permission(&identity);
            self.handle_event(AttachmentEvent::Permission {
                identity,
                granted: decision == PermissionDecision::Granted,
            });
        } else {
            self.in_flight.insert(slot, AttachmentState::Complete);
        }
    }

    fn handle_permission(&mut self, identity: DeviceIdentity, granted: bool) {
        let slot = identity.device_name.clone();
        match self.in_flight.get(&slot) {
            Some(AttachmentState::AwaitingPermission) => {}
            _ => {
                debug!("stale permission event for {} ignored", identity);
                return;
            }
        }
        self.in_flight.insert(slot, AttachmentState::Complete);

        if !granted {
            // Ends orchestration for this attachment, silently.
            debug!("permission denied for {}", identity);
            return;
        }

        let channel = match self.opener.open_channel(&identity) {
            Ok(channel) => channel,
            Err(e) => {
                warn!("could not open control channel for {}: {}", identity, e);
                return;
            }
        };

        let outcome = classify(&identity, &self.accessory, channel);
        for warning in &outcome.warnings {
            warn!(
                "identifying string {:?} not fully delivered to {}: {}",
                warning.slot, identity, warning.error
            );
        }
        info!("device {} classified as {}", identity, outcome.result);

        // A write failure here never rolls back a handshake that already
        // completed on the wire; the record reconciles on the next attach.
        let key = identity.key();
        match self.registry.update_type(&key, outcome.result) {
            Ok(rows) if rows > 0 => debug!("device type updated for {}", key),
            Ok(_) => error!("no registry row matched key {} for type update", key),
            Err(e) => error!("failed to update device type for {}: {}", key, e),
        }
    }

    fn handle_detached(&mut self, identity: &DeviceIdentity) {
        info!("device detached: {}", identity);
        if self.in_flight.remove(&identity.device_name).is_some() {
            debug!("in-flight flag cleared for {}", identity.device_name);
        }
    }
}
