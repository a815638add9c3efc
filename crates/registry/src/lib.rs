//! Device registry with Arc-per-device pattern for minimal lock contention.
//!
//! The bonding state machine is the only writer of bond state; everything
//! else reads through [`DeviceProperties`] accessors or takes a
//! [`DeviceSnapshot`].

pub mod device;
pub mod registry;
pub mod store;

pub use device::{DeviceProperties, DeviceSnapshot};
pub use registry::{BondedChange, DeviceRegistry};
pub use store::{DeviceStore, FileDeviceStore, MemoryDeviceStore, StoreError};
