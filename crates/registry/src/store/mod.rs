//! Device persistence trait and implementations (memory, file).

mod file;
mod memory;

use auto_impl::auto_impl;
use bondkeep_primitives::Address;
use thiserror::Error;

use crate::device::DeviceSnapshot;

pub use file::FileDeviceStore;
pub use memory::MemoryDeviceStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Device persistence trait with auto-impl for &, Box, Arc.
#[auto_impl(&, Box, Arc)]
pub trait DeviceStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<DeviceSnapshot>, StoreError>;
    fn save(&self, snapshot: &DeviceSnapshot) -> Result<(), StoreError>;

    fn save_batch(&self, snapshots: &[DeviceSnapshot]) -> Result<(), StoreError> {
        for snapshot in snapshots {
            self.save(snapshot)?;
        }
        Ok(())
    }

    fn remove(&self, address: &Address) -> Result<(), StoreError>;
    fn get(&self, address: &Address) -> Result<Option<DeviceSnapshot>, StoreError>;

    fn contains(&self, address: &Address) -> Result<bool, StoreError> {
        Ok(self.get(address)?.is_some())
    }

    fn count(&self) -> Result<usize, StoreError>;
    fn clear(&self) -> Result<(), StoreError>;

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
