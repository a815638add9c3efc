//! In-memory device store (does not persist across restarts).

use std::collections::HashMap;

use bondkeep_primitives::Address;
use parking_lot::RwLock;

use crate::device::DeviceSnapshot;

use super::{DeviceStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryDeviceStore {
    devices: RwLock<HashMap<Address, DeviceSnapshot>>,
}

impl MemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DeviceStore for MemoryDeviceStore {
    fn load_all(&self) -> Result<Vec<DeviceSnapshot>, StoreError> {
        Ok(self.devices.read().values().cloned().collect())
    }

    fn save(&self, snapshot: &DeviceSnapshot) -> Result<(), StoreError> {
        self.devices
            .write()
            .insert(snapshot.address, snapshot.clone());
        Ok(())
    }

    fn remove(&self, address: &Address) -> Result<(), StoreError> {
        self.devices.write().remove(address);
        Ok(())
    }

    fn get(&self, address: &Address) -> Result<Option<DeviceSnapshot>, StoreError> {
        Ok(self.devices.read().get(address).cloned())
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.devices.read().len())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.devices.write().clear();
        Ok(())
    }
}
