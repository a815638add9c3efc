//! Collaborator seams: the lower-layer gateway and the outbound surfaces.

use std::sync::Arc;

use auto_impl::auto_impl;
use bondkeep_primitives::{
    AccessKind, AccessPermission, Address, AddressType, BondState, OobData, Profile, Transport,
};

use crate::events::{BondStateChange, PairingRequest};

/// Imperative operations of the lower layer that performs pairing.
///
/// Each call returns whether the lower layer accepted it. Outcomes arrive
/// later as callbacks.
#[auto_impl(&, Box, Arc)]
pub trait BondGateway: Send + Sync {
    fn create_bond(&self, address: Address, address_type: AddressType, transport: Transport) -> bool;

    fn create_bond_out_of_band(
        &self,
        address: Address,
        transport: Transport,
        p192: Option<&OobData>,
        p256: Option<&OobData>,
    ) -> bool;

    fn cancel_bond(&self, address: Address) -> bool;

    fn remove_bond(&self, address: Address) -> bool;

    /// Whether a previous pairing still holds the lower layer's bonding resources.
    fn pairing_is_busy(&self) -> bool;

    fn set_pairing_confirmation(&self, address: Address, accept: bool) -> bool;
}

/// Receives the ordered bond state notifications.
#[auto_impl(&, Box, Arc)]
pub trait LifecycleSink: Send + Sync {
    fn on_bond_state_changed(&self, change: &BondStateChange);
}

/// Hook run before the lifecycle broadcast so profile layers react first.
#[auto_impl(&, Box, Arc)]
pub trait BondStateObserver: Send + Sync {
    fn on_bond_state_changed(&self, address: Address, previous: BondState, current: BondState);
}

/// A profile service whose per-device connection policy is reset on unbond.
#[auto_impl(&, Box, Arc)]
pub trait ConnectionPolicyReset: Send + Sync {
    fn profile(&self) -> Profile;

    fn reset_connection_policy(&self, address: Address);
}

/// Phonebook, message and SIM access permission flags.
#[auto_impl(&, Box, Arc)]
pub trait AccessPermissions: Send + Sync {
    fn set_access_permission(&self, address: Address, kind: AccessKind, permission: AccessPermission);
}

/// Surface that prompts for passkey, PIN or consent.
#[auto_impl(&, Box, Arc)]
pub trait PairingConsent: Send + Sync {
    fn on_pairing_request(&self, request: &PairingRequest);
}

impl LifecycleSink for () {
    fn on_bond_state_changed(&self, _change: &BondStateChange) {}
}

impl BondStateObserver for () {
    fn on_bond_state_changed(&self, _address: Address, _previous: BondState, _current: BondState) {}
}

impl AccessPermissions for () {
    fn set_access_permission(&self, _address: Address, _kind: AccessKind, _permission: AccessPermission) {}
}

impl PairingConsent for () {
    fn on_pairing_request(&self, _request: &PairingRequest) {}
}

/// Everything the machine calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn BondGateway>,
    pub sink: Arc<dyn LifecycleSink>,
    pub observer: Arc<dyn BondStateObserver>,
    pub profiles: Vec<Arc<dyn ConnectionPolicyReset>>,
    pub permissions: Arc<dyn AccessPermissions>,
    pub consent: Arc<dyn PairingConsent>,
}

impl Collaborators {
    pub fn new(gateway: Arc<dyn BondGateway>, sink: Arc<dyn LifecycleSink>) -> Self {
        Self {
            gateway,
            sink,
            observer: Arc::new(()),
            profiles: Vec::new(),
            permissions: Arc::new(()),
            consent: Arc::new(()),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BondStateObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_profile(mut self, profile: Arc<dyn ConnectionPolicyReset>) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn AccessPermissions>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_consent(mut self, consent: Arc<dyn PairingConsent>) -> Self {
        self.consent = consent;
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let profiles: Vec<Profile> = self.profiles.iter().map(|p| p.profile()).collect();
        f.debug_struct("Collaborators")
            .field("profiles", &profiles)
            .finish_non_exhaustive()
    }
}
