//! Per-device properties: atomics for the hot fields, RwLocks for the rest.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use bondkeep_primitives::{Address, AddressType, BondState, ClassOfDevice, DeviceType};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Properties of one remote device.
#[derive(Debug)]
pub struct DeviceProperties {
    address: Address,

    bond_state: AtomicU8,
    device_type: AtomicU8,
    address_type: AtomicU8,
    class_of_device: AtomicU32,
    bonding_initiated_locally: AtomicBool,

    name: RwLock<Option<String>>,
    identity_address: RwLock<Option<Address>>,
    /// `None` until service discovery completes for the current bond.
    uuids: RwLock<Option<Vec<Uuid>>>,
}

impl DeviceProperties {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            bond_state: AtomicU8::new(BondState::None as u8),
            device_type: AtomicU8::new(DeviceType::Unknown as u8),
            address_type: AtomicU8::new(AddressType::Public as u8),
            class_of_device: AtomicU32::new(0),
            bonding_initiated_locally: AtomicBool::new(false),
            name: RwLock::new(None),
            identity_address: RwLock::new(None),
            uuids: RwLock::new(None),
        }
    }

    pub fn with_type(address: Address, device_type: DeviceType) -> Self {
        let device = Self::new(address);
        device.set_device_type(device_type);
        device
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn bond_state(&self) -> BondState {
        BondState::from_u8(self.bond_state.load(Ordering::Acquire))
    }

    pub(crate) fn store_bond_state(&self, state: BondState) {
        self.bond_state.store(state as u8, Ordering::Release);
    }

    pub fn device_type(&self) -> DeviceType {
        DeviceType::from_u8(self.device_type.load(Ordering::Relaxed))
    }

    pub fn set_device_type(&self, device_type: DeviceType) {
        self.device_type.store(device_type as u8, Ordering::Relaxed);
    }

    pub fn address_type(&self) -> AddressType {
        AddressType::from_u8(self.address_type.load(Ordering::Relaxed))
    }

    pub fn set_address_type(&self, address_type: AddressType) {
        self.address_type
            .store(address_type as u8, Ordering::Relaxed);
    }

    pub fn class_of_device(&self) -> ClassOfDevice {
        ClassOfDevice::new(self.class_of_device.load(Ordering::Relaxed))
    }

    pub fn set_class_of_device(&self, class: ClassOfDevice) {
        self.class_of_device.store(class.raw(), Ordering::Relaxed);
    }

    pub fn is_bonding_initiated_locally(&self) -> bool {
        self.bonding_initiated_locally.load(Ordering::Relaxed)
    }

    pub fn set_bonding_initiated_locally(&self, local: bool) {
        self.bonding_initiated_locally
            .store(local, Ordering::Relaxed);
    }

    pub fn name(&self) -> Option<String> {
        self.name.read().clone()
    }

    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = Some(name.into());
    }

    /// Explicitly resolved identity address, if one was learned.
    pub fn identity_address(&self) -> Option<Address> {
        *self.identity_address.read()
    }

    pub fn set_identity_address(&self, identity: Option<Address>) {
        *self.identity_address.write() = identity;
    }

    /// Identity this device resolves to.
    ///
    /// Falls back to the device's own address when it is a classic or dual
    /// device, since that address is already the public identity.
    pub fn resolved_identity(&self) -> Option<Address> {
        self.identity_address().or_else(|| {
            self.device_type()
                .has_classic_identity()
                .then_some(self.address)
        })
    }

    pub fn uuids(&self) -> Option<Vec<Uuid>> {
        self.uuids.read().clone()
    }

    pub fn has_service_uuids(&self) -> bool {
        self.uuids.read().is_some()
    }

    pub fn set_uuids(&self, uuids: Vec<Uuid>) {
        *self.uuids.write() = Some(uuids);
    }

    pub fn clear_uuids(&self) {
        *self.uuids.write() = None;
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            address: self.address,
            name: self.name(),
            device_type: self.device_type(),
            address_type: self.address_type(),
            class_of_device: self.class_of_device(),
            bond_state: self.bond_state(),
            identity_address: self.identity_address(),
            uuids: self.uuids(),
        }
    }

    /// Restore persisted properties. A persisted `Bonding` state is dropped
    /// to `None`, since no pairing survives a restart.
    pub fn restore(&self, snapshot: &DeviceSnapshot) {
        *self.name.write() = snapshot.name.clone();
        self.set_device_type(snapshot.device_type);
        self.set_address_type(snapshot.address_type);
        self.set_class_of_device(snapshot.class_of_device);
        let state = match snapshot.bond_state {
            BondState::Bonding => BondState::None,
            other => other,
        };
        self.store_bond_state(state);
        self.set_identity_address(snapshot.identity_address);
        *self.uuids.write() = snapshot.uuids.clone();
    }
}

/// Serializable device state for persistence and for readers outside the
/// state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub address: Address,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub device_type: DeviceType,
    #[serde(default)]
    pub address_type: AddressType,
    #[serde(default)]
    pub class_of_device: ClassOfDevice,
    pub bond_state: BondState,
    #[serde(default)]
    pub identity_address: Option<Address>,
    #[serde(default)]
    pub uuids: Option<Vec<Uuid>>,
}

impl DeviceSnapshot {
    pub fn into_properties(self) -> (Address, DeviceProperties) {
        let device = DeviceProperties::new(self.address);
        device.restore(&self);
        (self.address, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, last])
    }

    #[test]
    fn test_device_defaults() {
        let device = DeviceProperties::new(addr(1));
        assert_eq!(device.bond_state(), BondState::None);
        assert_eq!(device.device_type(), DeviceType::Unknown);
        assert!(!device.has_service_uuids());
        assert!(!device.is_bonding_initiated_locally());
        assert_eq!(device.resolved_identity(), None);
    }

    #[test]
    fn test_resolved_identity() {
        let classic = DeviceProperties::with_type(addr(1), DeviceType::Classic);
        assert_eq!(classic.resolved_identity(), Some(addr(1)));

        let le = DeviceProperties::with_type(addr(2), DeviceType::Le);
        assert_eq!(le.resolved_identity(), None);
        le.set_identity_address(Some(addr(9)));
        assert_eq!(le.resolved_identity(), Some(addr(9)));
    }

    #[test]
    fn test_uuids() {
        let device = DeviceProperties::new(addr(1));
        device.set_uuids(Vec::new());
        assert!(device.has_service_uuids());
        device.clear_uuids();
        assert!(!device.has_service_uuids());
    }

    #[test]
    fn test_snapshot_restore_drops_bonding() {
        let device = DeviceProperties::with_type(addr(1), DeviceType::Dual);
        device.set_name("Headset");
        device.store_bond_state(BondState::Bonding);

        let (address, restored) = device.snapshot().into_properties();
        assert_eq!(address, addr(1));
        assert_eq!(restored.bond_state(), BondState::None);
        assert_eq!(restored.device_type(), DeviceType::Dual);
        assert_eq!(restored.name().as_deref(), Some("Headset"));
    }
}
