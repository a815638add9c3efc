//! Bonding state machine over one ordered event queue.
//!
//! Commands and lower-layer callbacks are processed one at a time. Time is
//! passed in by the caller, so the machine itself never sleeps: delayed
//! events sit in a [`TimerQueue`] until [`BondStateMachine::fire_due`] is
//! called at or after their deadline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use bondkeep_primitives::{Address, BondState, ClassOfDevice, HalStatus, SspVariant, UnbondReason};
use bondkeep_registry::DeviceRegistry;
use serde::Serialize;
use strum::Display;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::BondMachineConfig;
use crate::error::{BondError, GatewayOp};
use crate::event::{BondEvent, CreateBondRequest};
use crate::events::BondStateChange;
use crate::metrics::BondMetrics;
use crate::timer::{TimerId, TimerQueue};
use crate::traits::Collaborators;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum MachineState {
    /// No operation in flight.
    Stable,
    /// At least one address has a command in flight or a withheld bonded notification.
    PendingCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Accepted,
    /// Busy lower layer; retried later.
    Scheduled,
    /// Address busy; replayed on the next state transition.
    Deferred,
    Handled,
    Rejected,
}

impl Outcome {
    fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted | Self::Scheduled | Self::Deferred)
    }
}

pub struct BondStateMachine {
    pub(crate) config: BondMachineConfig,
    pub(crate) registry: Arc<DeviceRegistry>,
    pub(crate) collaborators: Collaborators,
    pub(crate) metrics: BondMetrics,

    state: MachineState,
    /// Addresses with a create or remove in flight.
    pending_devices: HashSet<Address>,
    /// Link-level bonded addresses waiting for service discovery.
    pub(crate) pending_bonded: HashMap<Address, TimerId>,

    queue: VecDeque<BondEvent>,
    deferred: VecDeque<BondEvent>,
    pub(crate) timers: TimerQueue<BondEvent>,
}

impl BondStateMachine {
    pub fn new(
        config: BondMachineConfig,
        registry: Arc<DeviceRegistry>,
        collaborators: Collaborators,
    ) -> Self {
        info!(profiles = collaborators.profiles.len(), "bond state machine starting in Stable state");
        Self {
            config,
            registry,
            collaborators,
            metrics: BondMetrics::default(),
            state: MachineState::Stable,
            pending_devices: HashSet::new(),
            pending_bonded: HashMap::new(),
            queue: VecDeque::new(),
            deferred: VecDeque::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Whether the address has a command in flight or a withheld notification.
    pub fn is_pending(&self, address: &Address) -> bool {
        self.pending_devices.contains(address) || self.pending_bonded.contains_key(address)
    }

    pub fn is_withheld(&self, address: &Address) -> bool {
        self.pending_bonded.contains_key(address)
    }

    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub fn scheduled_len(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Start bonding. Rejected up front unless the device is unbonded and no
    /// create for it is already queued, scheduled or deferred.
    pub fn create_bond(&mut self, request: CreateBondRequest, now: Instant) -> bool {
        let address = request.address;
        let state = self.registry.bond_state(&address);
        if !state.is_none() {
            debug!(%address, %state, "create bond ignored, device is not unbonded");
            return false;
        }
        if self.has_queued_create(&address) {
            debug!(%address, "create bond ignored, one is already queued");
            return false;
        }
        self.submit(BondEvent::CreateBond(request), now).is_accepted()
    }

    pub fn remove_bond(&mut self, address: Address, now: Instant) -> bool {
        let state = self.registry.bond_state(&address);
        if !state.is_bonded() {
            warn!(%address, %state, "bond cannot be removed");
            return false;
        }
        self.submit(BondEvent::RemoveBond { address }, now)
            .is_accepted()
    }

    pub fn cancel_bond(&mut self, address: Address, now: Instant) -> bool {
        self.submit(BondEvent::CancelBond { address }, now)
            .is_accepted()
    }

    pub fn on_bonding_state_changed(
        &mut self,
        status: HalStatus,
        address: Address,
        new_state: BondState,
        hci_reason: i32,
        now: Instant,
    ) {
        info!(%address, %status, %new_state, hci_reason, "bonding state changed");
        self.submit(
            BondEvent::BondingStateChanged {
                status,
                address,
                new_state,
                hci_reason,
            },
            now,
        );
    }

    pub fn on_ssp_request(&mut self, address: Address, variant: SspVariant, passkey: u32, now: Instant) {
        info!(address = %address.redacted(), %variant, passkey = "******", "ssp request");
        self.submit(
            BondEvent::SspRequest {
                address,
                variant,
                passkey,
            },
            now,
        );
    }

    pub fn on_pin_request(
        &mut self,
        address: Address,
        name: Option<String>,
        class_of_device: ClassOfDevice,
        min_16_digits: bool,
        now: Instant,
    ) {
        info!(%address, ?name, cod = class_of_device.raw(), min_16_digits, "pin request");
        self.submit(
            BondEvent::PinRequest {
                address,
                name,
                class_of_device,
                min_16_digits,
            },
            now,
        );
    }

    pub fn on_service_discovery_complete(&mut self, address: Address, uuids: Vec<Uuid>, now: Instant) {
        self.submit(BondEvent::ServiceDiscoveryComplete { address, uuids }, now);
    }

    /// Process every scheduled event due at `now`. Returns how many fired.
    pub fn fire_due(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(event) = self.timers.pop_due(now) {
            fired += 1;
            self.submit(event, now);
        }
        fired
    }

    fn has_queued_create(&self, address: &Address) -> bool {
        self.timers.iter().any(|event| event.is_create_for(address))
            || self.deferred.iter().any(|event| event.is_create_for(address))
            || self.queue.iter().any(|event| event.is_create_for(address))
    }

    fn submit(&mut self, event: BondEvent, now: Instant) -> Outcome {
        let outcome = self.process(event, now);
        while let Some(event) = self.queue.pop_front() {
            self.process(event, now);
        }
        outcome
    }

    fn process(&mut self, event: BondEvent, now: Instant) -> Outcome {
        trace!(kind = event.kind(), address = %event.address(), state = %self.state, "processing event");
        match self.state {
            MachineState::Stable => self.process_stable(event, now),
            MachineState::PendingCommand => {
                let outcome = self.process_pending(event, now);
                self.settle();
                outcome
            }
        }
    }

    fn process_stable(&mut self, event: BondEvent, now: Instant) -> Outcome {
        match event {
            BondEvent::CreateBond(request) => self.handle_create(request, 0, now),
            BondEvent::RetryCreateBond { request, attempt } => self.handle_create(request, attempt, now),
            BondEvent::RemoveBond { address } => self.handle_remove(address),
            BondEvent::CancelBond { address } => self.handle_cancel(address),
            BondEvent::BondingStateChanged {
                status,
                address,
                new_state,
                hci_reason,
            } => match new_state {
                BondState::Bonding => {
                    debug!(%address, "incoming pairing, serializing commands behind it");
                    self.deferred
                        .push_back(BondEvent::BondingStateChanged {
                            status,
                            address,
                            new_state,
                            hci_reason,
                        });
                    self.transition(MachineState::PendingCommand);
                    Outcome::Deferred
                }
                BondState::None => {
                    // Link key dropped by the lower layer on its own.
                    self.emit_logged(address, BondState::None, UnbondReason::from(status), false, now);
                    Outcome::Handled
                }
                BondState::Bonded => {
                    self.violation(BondError::UnexpectedBonded { address });
                    Outcome::Rejected
                }
            },
            BondEvent::SspRequest { address, .. } | BondEvent::PinRequest { address, .. } => {
                warn!(%address, "pairing request with no bond in progress");
                Outcome::Rejected
            }
            BondEvent::ServiceDiscoveryComplete { address, uuids } => {
                self.handle_service_discovery(address, uuids, now)
            }
            BondEvent::FireWithheldBonded { address } => self.handle_deadline(address, now),
        }
    }

    fn process_pending(&mut self, event: BondEvent, now: Instant) -> Outcome {
        let address = event.address();
        if event.is_deferrable() && self.is_pending(&address) {
            debug!(%address, kind = event.kind(), "address busy, deferring command");
            self.deferred.push_back(event);
            return Outcome::Deferred;
        }

        match event {
            BondEvent::CreateBond(request) => self.handle_create(request, 0, now),
            BondEvent::RetryCreateBond { request, attempt } => self.handle_create(request, attempt, now),
            BondEvent::RemoveBond { address } => self.handle_remove(address),
            BondEvent::CancelBond { address } => self.handle_cancel(address),
            BondEvent::BondingStateChanged {
                status,
                address,
                new_state,
                ..
            } => {
                let mut reason = UnbondReason::from(status);
                // A clean drop while commands are in flight is an explicit removal.
                if new_state.is_none() && reason == UnbondReason::BondSuccess {
                    reason = UnbondReason::Removed;
                }
                self.emit_logged(address, new_state, reason, false, now);
                if new_state.is_bonding() {
                    self.pending_devices.insert(address);
                } else {
                    self.pending_devices.remove(&address);
                }
                Outcome::Handled
            }
            BondEvent::SspRequest {
                address,
                variant,
                passkey,
            } => {
                self.handle_ssp_request(address, variant, passkey);
                Outcome::Handled
            }
            BondEvent::PinRequest {
                address,
                name,
                class_of_device,
                min_16_digits,
            } => {
                self.handle_pin_request(address, name, class_of_device, min_16_digits);
                Outcome::Handled
            }
            BondEvent::ServiceDiscoveryComplete { address, uuids } => {
                self.handle_service_discovery(address, uuids, now)
            }
            BondEvent::FireWithheldBonded { address } => self.handle_deadline(address, now),
        }
    }

    fn handle_create(&mut self, request: CreateBondRequest, attempt: u32, now: Instant) -> Outcome {
        let address = request.address;
        if self.collaborators.gateway.pairing_is_busy() {
            if attempt < self.config.max_bond_retries {
                let attempt = attempt + 1;
                debug!(%address, attempt, "lower layer busy, delaying create bond");
                self.metrics.create_busy_retries_total.increment(1);
                let at = now + self.config.bond_retry_delay();
                self.timers
                    .schedule(at, BondEvent::RetryCreateBond { request, attempt });
                return Outcome::Scheduled;
            }
            warn!(%address, attempt, "lower layer still busy, the bond will most likely fail");
        }

        match self.start_create(&request, now) {
            Ok(()) => {
                self.transition(MachineState::PendingCommand);
                Outcome::Accepted
            }
            Err(e) => {
                warn!(%address, error = %e, "create bond failed");
                Outcome::Rejected
            }
        }
    }

    fn start_create(&mut self, request: &CreateBondRequest, now: Instant) -> Result<(), BondError> {
        let address = request.address;
        let device = self.registry.device(address);
        let state = device.bond_state();
        if !state.is_none() {
            return Err(BondError::UnexpectedBondState {
                address,
                state,
                expected: BondState::None,
            });
        }

        info!(%address, transport = %request.transport, oob = request.has_oob(), "creating bond");
        self.metrics.create_requested_total.increment(1);

        let gateway = &self.collaborators.gateway;
        let (operation, accepted) = if request.has_oob() {
            (
                GatewayOp::CreateBondOutOfBand,
                gateway.create_bond_out_of_band(
                    address,
                    request.transport,
                    request.oob_p192.as_ref(),
                    request.oob_p256.as_ref(),
                ),
            )
        } else {
            (
                GatewayOp::CreateBond,
                gateway.create_bond(address, device.address_type(), request.transport),
            )
        };

        if !accepted {
            self.metrics.create_rejected_total.increment(1);
            self.notify(&BondStateChange::new(
                address,
                BondState::None,
                BondState::None,
                UnbondReason::RepeatedAttempts,
            ));
            return Err(BondError::GatewayRejected { operation, address });
        }

        device.set_bonding_initiated_locally(true);
        self.pending_devices.insert(address);
        self.emit_logged(address, BondState::Bonding, UnbondReason::BondSuccess, false, now);
        Ok(())
    }

    fn handle_remove(&mut self, address: Address) -> Outcome {
        let state = self.registry.bond_state(&address);
        if !state.is_bonded() {
            warn!(%address, %state, "bond cannot be removed");
            return Outcome::Rejected;
        }
        if !self.collaborators.gateway.remove_bond(address) {
            let e = BondError::GatewayRejected {
                operation: GatewayOp::RemoveBond,
                address,
            };
            error!(error = %e, "unexpected error while removing bond");
            return Outcome::Rejected;
        }

        self.pending_devices.insert(address);
        self.transition(MachineState::PendingCommand);
        Outcome::Accepted
    }

    fn handle_cancel(&mut self, address: Address) -> Outcome {
        let state = self.registry.bond_state(&address);
        if !state.is_bonding() {
            debug!(%address, %state, "nothing to cancel");
            return Outcome::Rejected;
        }
        if !self.collaborators.gateway.cancel_bond(address) {
            let e = BondError::GatewayRejected {
                operation: GatewayOp::CancelBond,
                address,
            };
            error!(error = %e, "unexpected error while cancelling bond");
            return Outcome::Rejected;
        }
        Outcome::Accepted
    }

    fn handle_service_discovery(&mut self, address: Address, uuids: Vec<Uuid>, now: Instant) -> Outcome {
        debug!(%address, count = uuids.len(), "service discovery complete");
        self.registry.set_uuids(address, uuids);
        if self.pending_bonded.contains_key(&address) {
            self.emit_logged(address, BondState::Bonded, UnbondReason::BondSuccess, false, now);
        }
        Outcome::Handled
    }

    fn handle_deadline(&mut self, address: Address, now: Instant) -> Outcome {
        if !self.pending_bonded.contains_key(&address) {
            trace!(%address, "stale bonded deadline");
            return Outcome::Handled;
        }

        info!(%address, "service discovery still pending, releasing bonded notification");
        self.metrics.bonded_deadline_fired_total.increment(1);
        if let Err(e) = self.emit(address, BondState::Bonded, UnbondReason::BondSuccess, true, now) {
            self.violation(e);
            // The deadline is spent; nothing else can release this entry.
            self.pending_bonded.remove(&address);
        }
        Outcome::Handled
    }

    /// Settle back to Stable once nothing is in flight or withheld.
    fn settle(&mut self) {
        if self.state == MachineState::PendingCommand
            && self.pending_devices.is_empty()
            && self.pending_bonded.is_empty()
        {
            self.transition(MachineState::Stable);
        }
    }

    fn transition(&mut self, to: MachineState) {
        if self.state == to {
            return;
        }
        info!(from = %self.state, %to, deferred = self.deferred.len(), "bond state machine transition");
        self.state = to;
        // Deferred events replay ahead of anything already queued, in arrival order.
        while let Some(event) = self.deferred.pop_back() {
            self.queue.push_front(event);
        }
    }

    pub(crate) fn emit_logged(
        &mut self,
        address: Address,
        new_state: BondState,
        reason: UnbondReason,
        from_deadline: bool,
        now: Instant,
    ) {
        if let Err(e) = self.emit(address, new_state, reason, from_deadline, now) {
            self.violation(e);
        }
    }

    pub(crate) fn violation(&self, e: BondError) {
        if e.is_invariant_violation() {
            self.metrics.invariant_violations_total.increment(1);
            error!(error = %e, "bond invariant violated, event dropped");
        } else {
            info!(error = %e, "event dropped");
        }
    }
}

impl std::fmt::Debug for BondStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BondStateMachine")
            .field("state", &self.state)
            .field("pending_devices", &self.pending_devices)
            .field("pending_bonded", &self.pending_bonded.keys().collect::<Vec<_>>())
            .field("deferred", &self.deferred.len())
            .field("scheduled", &self.timers.len())
            .finish_non_exhaustive()
    }
}
