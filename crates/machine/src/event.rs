//! Inbound events processed one at a time by the machine.

use bondkeep_primitives::{Address, BondState, ClassOfDevice, HalStatus, OobData, SspVariant, Transport};
use strum::IntoStaticStr;
use uuid::Uuid;

/// A create command and its optional out-of-band material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBondRequest {
    pub address: Address,
    pub transport: Transport,
    pub oob_p192: Option<OobData>,
    pub oob_p256: Option<OobData>,
}

impl CreateBondRequest {
    pub fn new(address: Address, transport: Transport) -> Self {
        Self {
            address,
            transport,
            oob_p192: None,
            oob_p256: None,
        }
    }

    pub fn with_oob(mut self, p192: Option<OobData>, p256: Option<OobData>) -> Self {
        self.oob_p192 = p192;
        self.oob_p256 = p256;
        self
    }

    pub fn has_oob(&self) -> bool {
        self.oob_p192.is_some() || self.oob_p256.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
pub enum BondEvent {
    CreateBond(CreateBondRequest),
    /// Busy-delayed create. `attempt` counts the delays so far.
    RetryCreateBond {
        request: CreateBondRequest,
        attempt: u32,
    },
    RemoveBond {
        address: Address,
    },
    CancelBond {
        address: Address,
    },
    BondingStateChanged {
        status: HalStatus,
        address: Address,
        new_state: BondState,
        hci_reason: i32,
    },
    SspRequest {
        address: Address,
        variant: SspVariant,
        passkey: u32,
    },
    PinRequest {
        address: Address,
        name: Option<String>,
        class_of_device: ClassOfDevice,
        min_16_digits: bool,
    },
    ServiceDiscoveryComplete {
        address: Address,
        uuids: Vec<Uuid>,
    },
    /// Coalescing deadline of a withheld bonded notification.
    FireWithheldBonded {
        address: Address,
    },
}

impl BondEvent {
    pub fn address(&self) -> Address {
        match self {
            Self::CreateBond(request) | Self::RetryCreateBond { request, .. } => request.address,
            Self::RemoveBond { address }
            | Self::CancelBond { address }
            | Self::BondingStateChanged { address, .. }
            | Self::SspRequest { address, .. }
            | Self::PinRequest { address, .. }
            | Self::ServiceDiscoveryComplete { address, .. }
            | Self::FireWithheldBonded { address } => *address,
        }
    }

    /// Commands that wait while their address has an operation in flight.
    pub fn is_deferrable(&self) -> bool {
        matches!(
            self,
            Self::CreateBond(_) | Self::RetryCreateBond { .. } | Self::RemoveBond { .. }
        )
    }

    pub fn is_create_for(&self, address: &Address) -> bool {
        matches!(
            self,
            Self::CreateBond(request) | Self::RetryCreateBond { request, .. } if request.address == *address
        )
    }

    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds_and_deferral() {
        let address = Address::new([1, 2, 3, 4, 5, 6]);
        let create = BondEvent::CreateBond(CreateBondRequest::new(address, Transport::Classic));
        assert_eq!(create.kind(), "CreateBond");
        assert!(create.is_deferrable());
        assert!(create.is_create_for(&address));
        assert!(!create.is_create_for(&Address::ANY));

        let cancel = BondEvent::CancelBond { address };
        assert!(!cancel.is_deferrable());
        assert_eq!(cancel.address(), address);

        let deadline = BondEvent::FireWithheldBonded { address };
        assert!(!deadline.is_deferrable());
    }
}
