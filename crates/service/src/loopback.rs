//! A gateway that plays back a successful pairing through the callback handle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bondkeep_machine::BondGateway;
use bondkeep_primitives::{Address, AddressType, BondState, HalStatus, OobData, SspVariant, Transport};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::callbacks::CallbackHandle;
use crate::config::LoopbackConfig;

/// Human Interface Device service class.
pub const HID_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1124_0000_1000_8000_0080_5f9b_34fb);

pub struct LoopbackGateway {
    callbacks: CallbackHandle,
    config: LoopbackConfig,
    uuids: Vec<Uuid>,
    busy: AtomicBool,
    /// Playback in progress per address.
    tasks: Mutex<HashMap<Address, JoinHandle<()>>>,
}

impl LoopbackGateway {
    pub fn new(callbacks: CallbackHandle, config: LoopbackConfig) -> Self {
        Self {
            callbacks,
            config,
            uuids: vec![HID_SERVICE_UUID],
            busy: AtomicBool::new(false),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_uuids(mut self, uuids: Vec<Uuid>) -> Self {
        self.uuids = uuids;
        self
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    fn play_bond(&self, address: Address) -> bool {
        let callbacks = self.callbacks.clone();
        let config = self.config.clone();
        let uuids = self.uuids.clone();

        self.spawn(address, async move {
            if let Some(passkey) = config.passkey {
                let variant = SspVariant::PasskeyConfirmation as i32;
                if callbacks.ssp_request(address, variant, passkey).is_err() {
                    return;
                }
            }

            time::sleep(config.bonded_delay()).await;
            let bonded = BondState::Bonded as i32;
            if callbacks
                .bonding_state_changed(HalStatus::Success.code(), address, bonded, 0)
                .is_err()
            {
                return;
            }

            if let Some(delay) = config.discovery_delay() {
                time::sleep(delay).await;
                let _ = callbacks.service_discovery_complete(address, uuids);
            }
        })
    }

    fn play_unbond(&self, address: Address, status: HalStatus) -> bool {
        let callbacks = self.callbacks.clone();
        let delay = self.config.unbond_delay();

        self.spawn(address, async move {
            time::sleep(delay).await;
            let _ = callbacks.bonding_state_changed(status.code(), address, BondState::None as i32, 0);
        })
    }

    /// Replace whatever is playing for `address`. Fails outside a runtime.
    fn spawn<F>(&self, address: Address, playback: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(%address, "no tokio runtime, loopback playback refused");
            return false;
        };

        let task = runtime.spawn(playback);
        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = tasks.insert(address, task) {
            previous.abort();
        }
        true
    }

    #[cfg(test)]
    fn tracked_playbacks(&self) -> usize {
        self.tasks.lock().len()
    }
}

impl BondGateway for LoopbackGateway {
    fn create_bond(&self, address: Address, address_type: AddressType, transport: Transport) -> bool {
        info!(%address, %address_type, %transport, "loopback create bond");
        self.play_bond(address)
    }

    fn create_bond_out_of_band(
        &self,
        address: Address,
        transport: Transport,
        p192: Option<&OobData>,
        p256: Option<&OobData>,
    ) -> bool {
        info!(%address, %transport, p192 = p192.is_some(), p256 = p256.is_some(), "loopback create bond out of band");
        self.play_bond(address)
    }

    fn cancel_bond(&self, address: Address) -> bool {
        info!(%address, "loopback cancel bond");
        self.play_unbond(address, HalStatus::AuthRejected)
    }

    fn remove_bond(&self, address: Address) -> bool {
        info!(%address, "loopback remove bond");
        self.play_unbond(address, HalStatus::Success)
    }

    fn pairing_is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn set_pairing_confirmation(&self, address: Address, accept: bool) -> bool {
        debug!(%address, accept, "loopback pairing confirmation");
        true
    }
}

impl Drop for LoopbackGateway {
    fn drop(&mut self) {
        for (_, task) in self.tasks.lock().drain() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for LoopbackGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackGateway")
            .field("config", &self.config)
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::callbacks::GatewayCallback;

    fn addr(last: u8) -> Address {
        Address::new([0x10, 0x20, 0x30, 0x40, 0x50, last])
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_playbacks_are_released() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gateway = LoopbackGateway::new(CallbackHandle::new(tx), LoopbackConfig::default());

        assert!(gateway.create_bond(addr(1), AddressType::Public, Transport::Le));
        assert!(gateway.create_bond(addr(2), AddressType::Public, Transport::Le));
        assert_eq!(gateway.tracked_playbacks(), 2);

        time::sleep(Duration::from_secs(5)).await;
        let mut delivered = 0;
        while rx.try_recv().is_ok() {
            delivered += 1;
        }
        assert_eq!(delivered, 4);

        assert!(gateway.remove_bond(addr(3)));
        assert_eq!(gateway.tracked_playbacks(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replaced_playback_is_aborted() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gateway = LoopbackGateway::new(CallbackHandle::new(tx), LoopbackConfig::default());

        assert!(gateway.create_bond(addr(1), AddressType::Public, Transport::Le));
        assert!(gateway.cancel_bond(addr(1)));
        assert_eq!(gateway.tracked_playbacks(), 1);

        time::sleep(Duration::from_secs(5)).await;
        let callback = rx.try_recv().unwrap();
        assert!(matches!(
            callback,
            GatewayCallback::BondingStateChanged { state: BondState::None, status: HalStatus::AuthRejected, .. }
        ));
        assert!(rx.try_recv().is_err());
    }
}
