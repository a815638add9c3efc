//! Recording fakes for the collaborator traits, and a harness wiring them
//! to a machine with a manually advanced clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bondkeep_primitives::{
    AccessKind, AccessPermission, Address, AddressType, BondState, ConnectionPolicy, OobData,
    Profile, Transport,
};
use bondkeep_registry::DeviceRegistry;
use parking_lot::Mutex;

use crate::config::BondMachineConfig;
use crate::events::{BondStateChange, PairingRequest};
use crate::machine::BondStateMachine;
use crate::traits::{
    AccessPermissions, BondGateway, BondStateObserver, Collaborators, ConnectionPolicyReset,
    LifecycleSink, PairingConsent,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    CreateBond {
        address: Address,
        address_type: AddressType,
        transport: Transport,
    },
    CreateBondOutOfBand {
        address: Address,
        transport: Transport,
        p192: bool,
        p256: bool,
    },
    CancelBond(Address),
    RemoveBond(Address),
    SetPairingConfirmation {
        address: Address,
        accept: bool,
    },
}

/// Gateway that records calls and answers from switchable flags.
#[derive(Debug)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    busy: AtomicBool,
    busy_queries: AtomicUsize,
    accept_create: AtomicBool,
    accept_remove: AtomicBool,
    accept_cancel: AtomicBool,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
            busy_queries: AtomicUsize::new(0),
            accept_create: AtomicBool::new(true),
            accept_remove: AtomicBool::new(true),
            accept_cancel: AtomicBool::new(true),
        }
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub fn set_accept_create(&self, accept: bool) {
        self.accept_create.store(accept, Ordering::SeqCst);
    }

    pub fn set_accept_remove(&self, accept: bool) {
        self.accept_remove.store(accept, Ordering::SeqCst);
    }

    pub fn set_accept_cancel(&self, accept: bool) {
        self.accept_cancel.store(accept, Ordering::SeqCst);
    }

    pub fn busy_queries(&self) -> usize {
        self.busy_queries.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| {
                matches!(
                    call,
                    GatewayCall::CreateBond { .. } | GatewayCall::CreateBondOutOfBand { .. }
                )
            })
            .count()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }
}

impl BondGateway for RecordingGateway {
    fn create_bond(&self, address: Address, address_type: AddressType, transport: Transport) -> bool {
        self.record(GatewayCall::CreateBond {
            address,
            address_type,
            transport,
        });
        self.accept_create.load(Ordering::SeqCst)
    }

    fn create_bond_out_of_band(
        &self,
        address: Address,
        transport: Transport,
        p192: Option<&OobData>,
        p256: Option<&OobData>,
    ) -> bool {
        self.record(GatewayCall::CreateBondOutOfBand {
            address,
            transport,
            p192: p192.is_some(),
            p256: p256.is_some(),
        });
        self.accept_create.load(Ordering::SeqCst)
    }

    fn cancel_bond(&self, address: Address) -> bool {
        self.record(GatewayCall::CancelBond(address));
        self.accept_cancel.load(Ordering::SeqCst)
    }

    fn remove_bond(&self, address: Address) -> bool {
        self.record(GatewayCall::RemoveBond(address));
        self.accept_remove.load(Ordering::SeqCst)
    }

    fn pairing_is_busy(&self) -> bool {
        self.busy_queries.fetch_add(1, Ordering::SeqCst);
        self.busy.load(Ordering::SeqCst)
    }

    fn set_pairing_confirmation(&self, address: Address, accept: bool) -> bool {
        self.record(GatewayCall::SetPairingConfirmation { address, accept });
        true
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    changes: Mutex<Vec<BondStateChange>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn changes(&self) -> Vec<BondStateChange> {
        self.changes.lock().clone()
    }

    /// `(previous, current)` pairs for one address, in order.
    pub fn transitions(&self, address: Address) -> Vec<(BondState, BondState)> {
        self.changes
            .lock()
            .iter()
            .filter(|change| change.address == address)
            .map(|change| (change.previous, change.current))
            .collect()
    }

    pub fn clear(&self) {
        self.changes.lock().clear();
    }
}

impl LifecycleSink for RecordingSink {
    fn on_bond_state_changed(&self, change: &BondStateChange) {
        self.changes.lock().push(*change);
    }
}

#[derive(Debug, Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<(Address, BondState, BondState)>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<(Address, BondState, BondState)> {
        self.calls.lock().clone()
    }
}

impl BondStateObserver for RecordingObserver {
    fn on_bond_state_changed(&self, address: Address, previous: BondState, current: BondState) {
        self.calls.lock().push((address, previous, current));
    }
}

/// Profile service holding a connection policy per address.
#[derive(Debug)]
pub struct RecordingProfile {
    profile: Profile,
    policies: Mutex<HashMap<Address, ConnectionPolicy>>,
}

impl RecordingProfile {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            policies: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_policy(&self, address: Address, policy: ConnectionPolicy) {
        self.policies.lock().insert(address, policy);
    }

    pub fn policy(&self, address: Address) -> ConnectionPolicy {
        self.policies
            .lock()
            .get(&address)
            .copied()
            .unwrap_or_default()
    }
}

impl ConnectionPolicyReset for RecordingProfile {
    fn profile(&self) -> Profile {
        self.profile
    }

    fn reset_connection_policy(&self, address: Address) {
        self.set_policy(address, ConnectionPolicy::Unknown);
    }
}

#[derive(Debug, Default)]
pub struct RecordingPermissions {
    permissions: Mutex<HashMap<(Address, AccessKind), AccessPermission>>,
}

impl RecordingPermissions {
    pub fn get(&self, address: Address, kind: AccessKind) -> Option<AccessPermission> {
        self.permissions.lock().get(&(address, kind)).copied()
    }

    pub fn grant(&self, address: Address, kind: AccessKind) {
        self.set_access_permission(address, kind, AccessPermission::Allowed);
    }
}

impl AccessPermissions for RecordingPermissions {
    fn set_access_permission(&self, address: Address, kind: AccessKind, permission: AccessPermission) {
        self.permissions
            .lock()
            .insert((address, kind), permission);
    }
}

#[derive(Debug, Default)]
pub struct RecordingConsent {
    requests: Mutex<Vec<PairingRequest>>,
}

impl RecordingConsent {
    pub fn requests(&self) -> Vec<PairingRequest> {
        self.requests.lock().clone()
    }
}

impl PairingConsent for RecordingConsent {
    fn on_pairing_request(&self, request: &PairingRequest) {
        self.requests.lock().push(request.clone());
    }
}

/// A machine wired to recording fakes, with a clock advanced by hand.
pub struct Harness {
    pub machine: BondStateMachine,
    pub registry: Arc<DeviceRegistry>,
    pub gateway: Arc<RecordingGateway>,
    pub sink: Arc<RecordingSink>,
    pub observer: Arc<RecordingObserver>,
    pub profiles: Vec<Arc<RecordingProfile>>,
    pub permissions: Arc<RecordingPermissions>,
    pub consent: Arc<RecordingConsent>,
    pub now: Instant,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(BondMachineConfig::default())
    }

    pub fn with_config(config: BondMachineConfig) -> Self {
        let registry = Arc::new(DeviceRegistry::new());
        let gateway = Arc::new(RecordingGateway::new());
        let sink = Arc::new(RecordingSink::new());
        let observer = Arc::new(RecordingObserver::default());
        let permissions = Arc::new(RecordingPermissions::default());
        let consent = Arc::new(RecordingConsent::default());
        let profiles: Vec<Arc<RecordingProfile>> = [Profile::HidHost, Profile::A2dp, Profile::LeAudio]
            .into_iter()
            .map(|profile| Arc::new(RecordingProfile::new(profile)))
            .collect();

        let mut collaborators = Collaborators::new(gateway.clone(), sink.clone())
            .with_observer(observer.clone())
            .with_permissions(permissions.clone())
            .with_consent(consent.clone());
        for profile in &profiles {
            collaborators = collaborators.with_profile(profile.clone());
        }

        let machine = BondStateMachine::new(config, Arc::clone(&registry), collaborators);
        Self {
            machine,
            registry,
            gateway,
            sink,
            observer,
            profiles,
            permissions,
            consent,
            now: Instant::now(),
        }
    }

    /// Advance the clock and fire whatever became due.
    pub fn advance(&mut self, by: Duration) -> usize {
        self.now += by;
        self.machine.fire_due(self.now)
    }

    /// Advance straight to the next scheduled deadline, if any.
    pub fn advance_to_next_deadline(&mut self) -> Option<usize> {
        let at = self.machine.next_deadline()?;
        self.now = self.now.max(at);
        Some(self.machine.fire_due(self.now))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
