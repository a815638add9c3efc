//! Address-keyed device map plus the bonded-devices collection.

use std::collections::HashMap;
use std::sync::Arc;

use bondkeep_primitives::{Address, BondState, DeviceType};
use parking_lot::RwLock;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::device::{DeviceProperties, DeviceSnapshot};
use crate::store::{DeviceStore, StoreError};

type DeviceMap = HashMap<Address, Arc<DeviceProperties>>;

/// Effect of a bond state write on the bonded-devices collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondedChange {
    /// Newly added to the bonded collection.
    Added,
    Removed,
    Unchanged,
}

/// Registry of known remote devices.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: RwLock<DeviceMap>,
    /// Bonded addresses in bonding order.
    bonded: RwLock<Vec<Address>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create device properties.
    pub fn device(&self, address: Address) -> Arc<DeviceProperties> {
        {
            let devices = self.devices.read();
            if let Some(device) = devices.get(&address) {
                return Arc::clone(device);
            }
        }

        let mut devices = self.devices.write();
        if let Some(device) = devices.get(&address) {
            return Arc::clone(device);
        }

        let device = Arc::new(DeviceProperties::new(address));
        devices.insert(address, Arc::clone(&device));
        debug!(%address, "new device added to registry");
        device
    }

    /// Insert or replace a device with a known type, as the property
    /// callbacks of the lower layer do.
    pub fn add_device(&self, address: Address, device_type: DeviceType) -> Arc<DeviceProperties> {
        let device = self.device(address);
        device.set_device_type(device_type);
        device
    }

    pub fn get(&self, address: &Address) -> Option<Arc<DeviceProperties>> {
        self.devices.read().get(address).cloned()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.devices.read().contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bond state of an address. Unknown addresses read as `None`.
    pub fn bond_state(&self, address: &Address) -> BondState {
        self.get(address)
            .map(|device| device.bond_state())
            .unwrap_or_default()
    }

    /// Write a bond state and keep the bonded collection in step.
    ///
    /// Dropping to `None` also forgets the service UUIDs, so the next
    /// bond waits for a fresh discovery.
    pub fn set_bond_state(&self, address: Address, state: BondState) -> BondedChange {
        let device = self.device(address);
        device.store_bond_state(state);
        trace!(%address, %state, "bond state written");

        match state {
            BondState::Bonded => {
                let mut bonded = self.bonded.write();
                if bonded.contains(&address) {
                    BondedChange::Unchanged
                } else {
                    bonded.push(address);
                    BondedChange::Added
                }
            }
            BondState::None => {
                device.clear_uuids();
                if self.remove_bonded(&address) {
                    BondedChange::Removed
                } else {
                    BondedChange::Unchanged
                }
            }
            BondState::Bonding => BondedChange::Unchanged,
        }
    }

    pub fn bonded_devices(&self) -> Vec<Address> {
        self.bonded.read().clone()
    }

    pub fn is_in_bonded_list(&self, address: &Address) -> bool {
        self.bonded.read().contains(address)
    }

    /// Drop an address from the bonded collection without touching its bond state.
    pub fn remove_bonded(&self, address: &Address) -> bool {
        let mut bonded = self.bonded.write();
        let before = bonded.len();
        bonded.retain(|a| a != address);
        before != bonded.len()
    }

    /// Identity address an address resolves to, if any.
    pub fn identity_of(&self, address: &Address) -> Option<Address> {
        self.get(address)
            .and_then(|device| device.resolved_identity())
    }

    pub fn set_identity_address(&self, address: Address, identity: Address) {
        self.device(address)
            .set_identity_address(Some(identity));
    }

    pub fn set_uuids(&self, address: Address, uuids: Vec<Uuid>) {
        self.device(address).set_uuids(uuids);
    }

    pub fn has_service_uuids(&self, address: &Address) -> bool {
        self.get(address)
            .is_some_and(|device| device.has_service_uuids())
    }

    pub fn snapshots(&self) -> Vec<DeviceSnapshot> {
        self.devices
            .read()
            .values()
            .map(|device| device.snapshot())
            .collect()
    }

    pub fn load_from_store<S>(&self, store: &S) -> Result<usize, StoreError>
    where
        S: DeviceStore + ?Sized,
    {
        let snapshots = store.load_all()?;
        let count = snapshots.len();

        let mut devices = self.devices.write();
        let mut bonded = self.bonded.write();
        for snapshot in snapshots {
            let (address, device) = snapshot.into_properties();
            if device.bond_state().is_bonded() && !bonded.contains(&address) {
                bonded.push(address);
            }
            devices.insert(address, Arc::new(device));
        }

        debug!(count, bonded = bonded.len(), "loaded devices from store");
        Ok(count)
    }

    pub fn save_to_store<S>(&self, store: &S) -> Result<usize, StoreError>
    where
        S: DeviceStore + ?Sized,
    {
        let snapshots = self.snapshots();
        let count = snapshots.len();

        store.save_batch(&snapshots)?;
        store.flush()?;

        debug!(count, "saved devices to store");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::store::MemoryDeviceStore;

    fn addr(last: u8) -> Address {
        Address::new([0x00, 0x11, 0x22, 0x33, 0x44, last])
    }

    #[test]
    fn test_device_get_or_create() {
        let registry = DeviceRegistry::new();
        assert!(registry.is_empty());

        let a = registry.device(addr(1));
        let b = registry.device(addr(1));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.bond_state(&addr(2)), BondState::None);
        assert!(!registry.contains(&addr(2)));
    }

    #[test]
    fn test_bonded_collection_follows_state() {
        let registry = DeviceRegistry::new();

        assert_eq!(
            registry.set_bond_state(addr(1), BondState::Bonding),
            BondedChange::Unchanged
        );
        assert_eq!(
            registry.set_bond_state(addr(1), BondState::Bonded),
            BondedChange::Added
        );
        assert_eq!(
            registry.set_bond_state(addr(1), BondState::Bonded),
            BondedChange::Unchanged
        );
        assert_eq!(registry.bonded_devices(), vec![addr(1)]);

        registry.set_uuids(addr(1), Vec::new());
        assert_eq!(
            registry.set_bond_state(addr(1), BondState::None),
            BondedChange::Removed
        );
        assert!(registry.bonded_devices().is_empty());
        assert!(!registry.has_service_uuids(&addr(1)));
    }

    #[test]
    fn test_identity_of() {
        let registry = DeviceRegistry::new();
        registry.add_device(addr(1), DeviceType::Classic);
        registry.add_device(addr(2), DeviceType::Le);
        registry.set_identity_address(addr(2), addr(1));

        assert_eq!(registry.identity_of(&addr(1)), Some(addr(1)));
        assert_eq!(registry.identity_of(&addr(2)), Some(addr(1)));
        assert_eq!(registry.identity_of(&addr(3)), None);
    }

    #[test]
    fn test_store_roundtrip_rebuilds_bonded_list() {
        let registry = DeviceRegistry::new();
        registry.add_device(addr(1), DeviceType::Dual);
        registry.set_bond_state(addr(1), BondState::Bonded);
        registry.set_bond_state(addr(2), BondState::Bonding);

        let store = MemoryDeviceStore::new();
        assert_eq!(registry.save_to_store(&store).unwrap(), 2);

        let restored = DeviceRegistry::new();
        assert_eq!(restored.load_from_store(&store).unwrap(), 2);
        assert_eq!(restored.bonded_devices(), vec![addr(1)]);
        assert_eq!(restored.bond_state(&addr(2)), BondState::None);
        assert_eq!(
            restored.get(&addr(1)).unwrap().device_type(),
            DeviceType::Dual
        );
    }

    #[test]
    fn test_concurrent_device_creation() {
        let registry = Arc::new(DeviceRegistry::new());
        let mut handles = vec![];

        for i in 0..8u8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for j in 0..16u8 {
                    registry.device(addr(j));
                    registry.device(addr(i));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 16);
    }
}
