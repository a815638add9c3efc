//! Cloneable handle for issuing bond commands to the service.

use bondkeep_machine::{CreateBondRequest, EventEmitter, LifecycleEvent, MachineState};
use bondkeep_primitives::{Address, BondState};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::error::ServiceError;
use crate::service::BondCommand;

/// Point-in-time view of one address as the service sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BondStatus {
    pub address: Address,
    pub bond_state: BondState,
    /// A command is in flight or the bonded notification is withheld.
    pub pending: bool,
    pub withheld: bool,
    pub machine_state: MachineState,
}

#[derive(Debug, Clone)]
pub struct BondHandle {
    command_tx: mpsc::UnboundedSender<BondCommand>,
    events: EventEmitter,
}

impl BondHandle {
    pub fn new(command_tx: mpsc::UnboundedSender<BondCommand>, events: EventEmitter) -> Self {
        Self { command_tx, events }
    }

    /// Request a bond. `Ok(false)` means the request was refused.
    pub async fn create_bond(&self, request: CreateBondRequest) -> Result<bool, ServiceError> {
        self.request(|response_tx| BondCommand::CreateBond {
            request,
            response_tx,
        })
        .await
    }

    pub async fn remove_bond(&self, address: Address) -> Result<bool, ServiceError> {
        self.request(|response_tx| BondCommand::RemoveBond {
            address,
            response_tx,
        })
        .await
    }

    pub async fn cancel_bond(&self, address: Address) -> Result<bool, ServiceError> {
        self.request(|response_tx| BondCommand::CancelBond {
            address,
            response_tx,
        })
        .await
    }

    pub async fn status(&self, address: Address) -> Result<BondStatus, ServiceError> {
        self.request(|response_tx| BondCommand::Status {
            address,
            response_tx,
        })
        .await
    }

    /// Lifecycle notifications and pairing requests.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> BondCommand,
    ) -> Result<T, ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(command(tx))
            .map_err(|_| ServiceError::ServiceStopped)?;
        rx.await.map_err(|_| ServiceError::ServiceStopped)
    }
}
