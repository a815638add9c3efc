//! Lifecycle notification emission with bonded-notification coalescing.

use std::time::Instant;

use bondkeep_primitives::{AccessKind, AccessPermission, Address, BondState, UnbondReason};
use bondkeep_registry::BondedChange;
use strum::IntoEnumIterator;
use tracing::{debug, info, trace};

use crate::consolidate::{Consolidation, cleanup_prev_bond_records};
use crate::error::BondError;
use crate::event::BondEvent;
use crate::events::BondStateChange;
use crate::machine::BondStateMachine;

impl BondStateMachine {
    /// Apply `new_state` to the registry and tell downstream consumers.
    ///
    /// A link-level `Bonded` for a device without service UUIDs is withheld
    /// until discovery completes or the deadline fires; if the device was
    /// unbonded, `None => Bonding` is reported in its place. Returns the
    /// notification that was sent, if any.
    pub(crate) fn emit(
        &mut self,
        address: Address,
        new_state: BondState,
        reason: UnbondReason,
        from_deadline: bool,
        now: Instant,
    ) -> Result<Option<BondStateChange>, BondError> {
        let device = self.registry.device(address);
        let mut previous = device.bond_state();
        let withheld = self.pending_bonded.contains_key(&address);

        if from_deadline && !(withheld && previous.is_bonded() && new_state.is_bonded()) {
            return Err(BondError::InvalidDeadline {
                address,
                previous,
                current: new_state,
            });
        }

        if withheld {
            if !previous.is_bonded() {
                return Err(BondError::WithheldStateMismatch {
                    address,
                    state: previous,
                });
            }
            if let Some(timer) = self.pending_bonded.remove(&address) {
                self.timers.cancel(timer);
            }
            if new_state.is_bonding() {
                self.registry
                    .set_bond_state(address, BondState::Bonding);
            }
            // Downstream last saw Bonding for this episode.
            previous = BondState::Bonding;
        }

        if previous == new_state {
            trace!(%address, state = %new_state, "bond state unchanged");
            return Ok(None);
        }

        if self.registry.set_bond_state(address, new_state) == BondedChange::Added {
            self.consolidate(address);
        }
        if new_state.is_none() {
            device.set_bonding_initiated_locally(false);
        }

        let mut current = new_state;
        if !from_deadline && new_state.is_bonded() && !device.has_service_uuids() {
            info!(%address, "bonded, waiting for service discovery before notifying");
            let at = now + self.config.pending_bonded_timeout();
            let timer = self
                .timers
                .schedule(at, BondEvent::FireWithheldBonded { address });
            self.pending_bonded.insert(address, timer);
            self.metrics.bonded_deferred_total.increment(1);

            if previous.is_none() {
                current = BondState::Bonding;
            } else {
                return Ok(None);
            }
        }

        let change = BondStateChange::new(address, previous, current, reason);
        self.notify(&change);
        Ok(Some(change))
    }

    /// Run the observer hook, then the sink, then terminal cleanup.
    pub(crate) fn notify(&self, change: &BondStateChange) {
        info!(
            address = %change.address,
            previous = %change.previous,
            current = %change.current,
            reason = %change.reason,
            "bond state change"
        );
        self.collaborators
            .observer
            .on_bond_state_changed(change.address, change.previous, change.current);
        self.collaborators.sink.on_bond_state_changed(change);

        if change.current.is_none() {
            self.clear_profile_state(change.address);
        }
    }

    fn clear_profile_state(&self, address: Address) {
        for kind in AccessKind::iter() {
            self.collaborators
                .permissions
                .set_access_permission(address, kind, AccessPermission::Unknown);
        }
        for profile in &self.collaborators.profiles {
            profile.reset_connection_policy(address);
        }
        debug!(%address, profiles = self.collaborators.profiles.len(), "profile policies reset");
    }

    fn consolidate(&self, address: Address) {
        let outcome = cleanup_prev_bond_records(
            &self.registry,
            self.collaborators.gateway.as_ref(),
            address,
        );
        if let Consolidation::Evicted(_) = outcome {
            self.metrics.consolidation_evicted_total.increment(1);
        }
    }
}
