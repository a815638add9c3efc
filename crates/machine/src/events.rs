//! Lifecycle notifications and non-blocking broadcast emitter.

use std::fmt;

use bondkeep_primitives::{Address, BondState, PairingVariant, UnbondReason};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::traits::{LifecycleSink, PairingConsent};

/// One bond state transition as seen by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondStateChange {
    pub address: Address,
    pub previous: BondState,
    pub current: BondState,
    /// Meaningful when `current` is `None`.
    pub reason: UnbondReason,
}

impl BondStateChange {
    pub fn new(address: Address, previous: BondState, current: BondState, reason: UnbondReason) -> Self {
        Self {
            address,
            previous,
            current,
            reason,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_none()
    }
}

impl fmt::Display for BondStateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} => {}", self.address, self.previous, self.current)?;
        if self.current.is_none() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

/// Request for the consent surface.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRequest {
    pub address: Address,
    pub variant: PairingVariant,
    /// Passkey or PIN to display, if any.
    pub pin: Option<u32>,
}

impl fmt::Debug for PairingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingRequest")
            .field("address", &self.address)
            .field("variant", &self.variant)
            .field("pin", &self.pin.map(|_| "******"))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    BondStateChanged(BondStateChange),
    PairingRequested(PairingRequest),
}

impl LifecycleEvent {
    pub fn address(&self) -> Address {
        match self {
            Self::BondStateChanged(change) => change.address,
            Self::PairingRequested(request) => request.address,
        }
    }
}

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Non-blocking broadcast emitter. Slow subscribers drop events independently.
#[derive(Debug, Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: LifecycleEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl LifecycleSink for EventEmitter {
    fn on_bond_state_changed(&self, change: &BondStateChange) {
        self.emit(LifecycleEvent::BondStateChanged(*change));
    }
}

impl PairingConsent for EventEmitter {
    fn on_pairing_request(&self, request: &PairingRequest) {
        self.emit(LifecycleEvent::PairingRequested(request.clone()));
    }
}
