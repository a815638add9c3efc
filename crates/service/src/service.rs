//! Bond service actor (runs in its own tokio task).

use std::sync::Arc;

use bondkeep_machine::{
    AccessPermissions, BondGateway, BondMachineConfig, BondStateMachine, BondStateObserver,
    Collaborators, ConnectionPolicyReset, CreateBondRequest, EventEmitter, PairingConsent,
};
use bondkeep_primitives::Address;
use bondkeep_registry::DeviceRegistry;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, info, trace};

use crate::callbacks::{CallbackHandle, GatewayCallback};
use crate::config::ServiceConfig;
use crate::handle::{BondHandle, BondStatus};

/// Commands from the handle to the service.
pub enum BondCommand {
    CreateBond {
        request: CreateBondRequest,
        response_tx: oneshot::Sender<bool>,
    },
    RemoveBond {
        address: Address,
        response_tx: oneshot::Sender<bool>,
    },
    CancelBond {
        address: Address,
        response_tx: oneshot::Sender<bool>,
    },
    Status {
        address: Address,
        response_tx: oneshot::Sender<BondStatus>,
    },
}

/// Owns the state machine and feeds it commands, callbacks and timer expiries
/// in arrival order.
pub struct BondService {
    command_rx: mpsc::UnboundedReceiver<BondCommand>,
    callback_rx: mpsc::UnboundedReceiver<GatewayCallback>,
    machine: BondStateMachine,
}

impl BondService {
    pub fn new(
        command_rx: mpsc::UnboundedReceiver<BondCommand>,
        callback_rx: mpsc::UnboundedReceiver<GatewayCallback>,
        machine: BondStateMachine,
    ) -> Self {
        Self {
            command_rx,
            callback_rx,
            machine,
        }
    }

    pub fn machine(&self) -> &BondStateMachine {
        &self.machine
    }

    /// Run the service event loop.
    ///
    /// Runs until every [`BondHandle`] is dropped. Callbacks still queued at
    /// that point are discarded.
    pub async fn run(mut self) {
        info!("bond service started");
        loop {
            let deadline = self.machine.next_deadline();
            let wake_at = deadline.map(Instant::from_std).unwrap_or_else(Instant::now);

            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        debug!("bond service shutting down");
                        break;
                    }
                },
                Some(callback) = self.callback_rx.recv() => {
                    self.handle_callback(callback);
                }
                _ = time::sleep_until(wake_at), if deadline.is_some() => {
                    let fired = self.machine.fire_due(now());
                    trace!(fired, "scheduled events fired");
                }
            }
        }
    }

    /// Convert self into a spawnable future.
    pub async fn into_task(self) {
        self.run().await;
    }

    fn handle_command(&mut self, cmd: BondCommand) {
        let now = now();
        match cmd {
            BondCommand::CreateBond {
                request,
                response_tx,
            } => {
                let _ = response_tx.send(self.machine.create_bond(request, now));
            }
            BondCommand::RemoveBond {
                address,
                response_tx,
            } => {
                let _ = response_tx.send(self.machine.remove_bond(address, now));
            }
            BondCommand::CancelBond {
                address,
                response_tx,
            } => {
                let _ = response_tx.send(self.machine.cancel_bond(address, now));
            }
            BondCommand::Status {
                address,
                response_tx,
            } => {
                let _ = response_tx.send(BondStatus {
                    address,
                    bond_state: self.machine.registry().bond_state(&address),
                    pending: self.machine.is_pending(&address),
                    withheld: self.machine.is_withheld(&address),
                    machine_state: self.machine.state(),
                });
            }
        }
    }

    fn handle_callback(&mut self, callback: GatewayCallback) {
        let now = now();
        match callback {
            GatewayCallback::BondingStateChanged {
                status,
                address,
                state,
                hci_reason,
            } => self
                .machine
                .on_bonding_state_changed(status, address, state, hci_reason, now),
            GatewayCallback::SspRequest {
                address,
                variant,
                passkey,
            } => self
                .machine
                .on_ssp_request(address, variant, passkey, now),
            GatewayCallback::PinRequest {
                address,
                name,
                class_of_device,
                min_16_digits,
            } => self
                .machine
                .on_pin_request(address, name, class_of_device, min_16_digits, now),
            GatewayCallback::ServiceDiscoveryComplete { address, uuids } => self
                .machine
                .on_service_discovery_complete(address, uuids, now),
        }
    }
}

/// Machine time follows the tokio clock, so paused-time tests drive deadlines.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

/// Wires a [`BondService`] to its handles.
///
/// The callback handle exists before the gateway, so a gateway that answers
/// through callbacks can be built from [`BondServiceBuilder::callbacks`].
pub struct BondServiceBuilder {
    config: ServiceConfig,
    machine_config: BondMachineConfig,
    registry: Arc<DeviceRegistry>,
    observer: Option<Arc<dyn BondStateObserver>>,
    profiles: Vec<Arc<dyn ConnectionPolicyReset>>,
    permissions: Option<Arc<dyn AccessPermissions>>,
    consent: Option<Arc<dyn PairingConsent>>,
    callback_tx: mpsc::UnboundedSender<GatewayCallback>,
    callback_rx: mpsc::UnboundedReceiver<GatewayCallback>,
}

impl BondServiceBuilder {
    pub fn new(registry: Arc<DeviceRegistry>) -> Self {
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();
        Self {
            config: ServiceConfig::default(),
            machine_config: BondMachineConfig::default(),
            registry,
            observer: None,
            profiles: Vec::new(),
            permissions: None,
            consent: None,
            callback_tx,
            callback_rx,
        }
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_machine_config(mut self, config: BondMachineConfig) -> Self {
        self.machine_config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn BondStateObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_profile(mut self, profile: Arc<dyn ConnectionPolicyReset>) -> Self {
        self.profiles.push(profile);
        self
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn AccessPermissions>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Route pairing requests somewhere other than the lifecycle broadcast.
    pub fn with_consent(mut self, consent: Arc<dyn PairingConsent>) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn callbacks(&self) -> CallbackHandle {
        CallbackHandle::new(self.callback_tx.clone())
    }

    /// Build the service and its command handle. Spawn the service with
    /// [`BondService::into_task`].
    pub fn build(self, gateway: Arc<dyn BondGateway>) -> (BondService, BondHandle) {
        let events = EventEmitter::new(self.config.callback_channel_capacity);
        let consent = self
            .consent
            .unwrap_or_else(|| Arc::new(events.clone()) as Arc<dyn PairingConsent>);

        let mut collaborators = Collaborators::new(gateway, Arc::new(events.clone()))
            .with_consent(consent);
        if let Some(observer) = self.observer {
            collaborators = collaborators.with_observer(observer);
        }
        if let Some(permissions) = self.permissions {
            collaborators = collaborators.with_permissions(permissions);
        }
        for profile in self.profiles {
            collaborators = collaborators.with_profile(profile);
        }

        let machine = BondStateMachine::new(self.machine_config, self.registry, collaborators);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let service = BondService::new(command_rx, self.callback_rx, machine);
        (service, BondHandle::new(command_tx, events))
    }
}
