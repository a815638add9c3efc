//! JSON file device store with atomic writes.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bondkeep_primitives::Address;
use parking_lot::RwLock;
use tracing::warn;

use crate::device::DeviceSnapshot;

use super::{DeviceStore, StoreError};

/// JSON file store. Loaded to memory on open, written back on flush and drop.
#[derive(Debug)]
pub struct FileDeviceStore {
    path: PathBuf,
    devices: RwLock<BTreeMap<Address, DeviceSnapshot>>,
    dirty: AtomicBool,
}

impl FileDeviceStore {
    /// Load an existing file or start empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let devices = if path.exists() {
            read_file(&path)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            devices: RwLock::new(devices),
            dirty: AtomicBool::new(false),
        })
    }

    /// Open, creating parent directories if needed.
    pub fn open_with_create_dir(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn write_file(&self) -> Result<(), StoreError> {
        let devices = self.devices.read();
        let snapshots: Vec<&DeviceSnapshot> = devices.values().collect();

        let tmp_path = self.path.with_extension("json.tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        serde_json::to_writer_pretty(&mut writer, &snapshots)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        writer.flush()?;
        drop(writer);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<Address, DeviceSnapshot>, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let snapshots: Vec<DeviceSnapshot> = serde_json::from_reader(reader)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(snapshots
        .into_iter()
        .map(|snapshot| (snapshot.address, snapshot))
        .collect())
}

impl DeviceStore for FileDeviceStore {
    fn load_all(&self) -> Result<Vec<DeviceSnapshot>, StoreError> {
        Ok(self.devices.read().values().cloned().collect())
    }

    fn save(&self, snapshot: &DeviceSnapshot) -> Result<(), StoreError> {
        self.devices
            .write()
            .insert(snapshot.address, snapshot.clone());
        self.mark_dirty();
        Ok(())
    }

    fn save_batch(&self, snapshots: &[DeviceSnapshot]) -> Result<(), StoreError> {
        {
            let mut devices = self.devices.write();
            for snapshot in snapshots {
                devices.insert(snapshot.address, snapshot.clone());
            }
        }
        self.mark_dirty();
        Ok(())
    }

    fn remove(&self, address: &Address) -> Result<(), StoreError> {
        if self.devices.write().remove(address).is_some() {
            self.mark_dirty();
        }
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
        self.mark_dirty();
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.is_dirty() {
            self.write_file()?;
            self.dirty.store(false, Ordering::Release);
        }
        Ok(())
    }
}

impl Drop for FileDeviceStore {
    fn drop(&mut self) {
        if self.is_dirty() {
            if let Err(e) = self.write_file() {
                warn!(path = %self.path.display(), error = %e, "failed to flush device store on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bondkeep_primitives::{BondState, DeviceType};

    use super::*;
    use crate::device::DeviceProperties;

    fn bonded_snapshot(last: u8) -> DeviceSnapshot {
        let device = DeviceProperties::with_type(Address::new([9, 8, 7, 6, 5, last]), DeviceType::Le);
        let mut snapshot = device.snapshot();
        snapshot.bond_state = BondState::Bonded;
        snapshot
    }

    #[test]
    fn test_flush_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        let store = FileDeviceStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(!path.exists());

        store.save(&bonded_snapshot(1)).unwrap();
        assert!(store.is_dirty());

        store.flush().unwrap();
        assert!(!store.is_dirty());
        assert!(path.exists());
    }

    #[test]
    fn test_reopen_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("devices.json");

        {
            let store = FileDeviceStore::open_with_create_dir(&path).unwrap();
            let snapshots: Vec<_> = (1..=3).map(bonded_snapshot).collect();
            store.save_batch(&snapshots).unwrap();
        }

        let store = FileDeviceStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 3);
        let loaded = store
            .get(&Address::new([9, 8, 7, 6, 5, 2]))
            .unwrap()
            .unwrap();
        assert_eq!(loaded.bond_state, BondState::Bonded);
        assert_eq!(loaded.device_type, DeviceType::Le);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");

        let store = FileDeviceStore::open(&path).unwrap();
        store.save(&bonded_snapshot(1)).unwrap();
        store.flush().unwrap();
        let written = fs::read_to_string(&path).unwrap();

        // A directory in the way of the temporary file makes the write fail.
        fs::create_dir(path.with_extension("json.tmp")).unwrap();
        store.save(&bonded_snapshot(2)).unwrap();
        assert!(store.flush().is_err());
        assert!(store.is_dirty());
        assert_eq!(fs::read_to_string(&path).unwrap(), written);

        fs::remove_dir(path.with_extension("json.tmp")).unwrap();
        store.flush().unwrap();
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(FileDeviceStore::open(&path).unwrap().count().unwrap(), 2);
    }
}
