//! Lower-layer callback entry points.
//!
//! The lower layer reports numeric status, state and variant codes. They are
//! decoded here, and the typed callback is queued for the service task.

use bondkeep_primitives::{Address, BondState, ClassOfDevice, HalStatus, SspVariant};
use tokio::sync::mpsc;
use tracing::{trace, warn};
use uuid::Uuid;

use crate::error::ServiceError;

/// Decoded lower-layer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCallback {
    BondingStateChanged {
        status: HalStatus,
        address: Address,
        state: BondState,
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
}

impl GatewayCallback {
    pub fn address(&self) -> Address {
        match self {
            Self::BondingStateChanged { address, .. }
            | Self::SspRequest { address, .. }
            | Self::PinRequest { address, .. }
            | Self::ServiceDiscoveryComplete { address, .. } => *address,
        }
    }
}

/// Cloneable handle the lower layer calls into. Never blocks.
#[derive(Debug, Clone)]
pub struct CallbackHandle {
    callback_tx: mpsc::UnboundedSender<GatewayCallback>,
}

impl CallbackHandle {
    pub fn new(callback_tx: mpsc::UnboundedSender<GatewayCallback>) -> Self {
        Self { callback_tx }
    }

    pub fn bonding_state_changed(
        &self,
        status: i32,
        address: Address,
        state: i32,
        hci_reason: i32,
    ) -> Result<(), ServiceError> {
        self.send(GatewayCallback::BondingStateChanged {
            status: HalStatus::from_code(status),
            address,
            state: BondState::from_code(state),
            hci_reason,
        })
    }

    /// Unknown variants are logged and dropped.
    pub fn ssp_request(&self, address: Address, variant: i32, passkey: u32) -> Result<(), ServiceError> {
        let Some(variant) = SspVariant::from_code(variant) else {
            warn!(address = %address.redacted(), variant, "unknown ssp variant, dropping request");
            return Ok(());
        };
        self.send(GatewayCallback::SspRequest {
            address,
            variant,
            passkey,
        })
    }

    pub fn pin_request(
        &self,
        address: Address,
        name: Option<String>,
        class_of_device: u32,
        min_16_digits: bool,
    ) -> Result<(), ServiceError> {
        self.send(GatewayCallback::PinRequest {
            address,
            name,
            class_of_device: ClassOfDevice::new(class_of_device),
            min_16_digits,
        })
    }

    pub fn service_discovery_complete(&self, address: Address, uuids: Vec<Uuid>) -> Result<(), ServiceError> {
        self.send(GatewayCallback::ServiceDiscoveryComplete { address, uuids })
    }

    fn send(&self, callback: GatewayCallback) -> Result<(), ServiceError> {
        trace!(address = %callback.address(), "queueing lower-layer callback");
        self.callback_tx
            .send(callback)
            .map_err(|_| ServiceError::ServiceStopped)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn addr() -> Address {
        Address::new([1, 2, 3, 4, 5, 6])
    }

    #[test]
    fn test_codes_are_decoded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = CallbackHandle::new(tx);

        handle.bonding_state_changed(10, addr(), 0, 0x13).unwrap();
        assert_matches!(
            rx.try_recv(),
            Ok(GatewayCallback::BondingStateChanged {
                status: HalStatus::RmtDevDown,
                state: BondState::None,
                hci_reason: 0x13,
                ..
            })
        );

        handle.pin_request(addr(), None, 0x2540, true).unwrap();
        assert_matches!(
            rx.try_recv(),
            Ok(GatewayCallback::PinRequest { class_of_device, min_16_digits: true, .. })
                if class_of_device.is_keyboard()
        );
    }

    #[test]
    fn test_unknown_ssp_variant_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = CallbackHandle::new(tx);

        handle.ssp_request(addr(), 9, 0).unwrap();
        assert!(rx.try_recv().is_err());

        handle.ssp_request(addr(), 3, 42).unwrap();
        assert_matches!(
            rx.try_recv(),
            Ok(GatewayCallback::SspRequest {
                variant: SspVariant::PasskeyNotification,
                passkey: 42,
                ..
            })
        );
    }

    #[test]
    fn test_send_after_stop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = CallbackHandle::new(tx);
        drop(rx);

        assert_eq!(
            handle.service_discovery_complete(addr(), Vec::new()),
            Err(ServiceError::ServiceStopped)
        );
    }
}
