//! Value types for the bonding lifecycle: addresses, bond states, status codes and pairing variants.

pub mod address;
pub mod bond;
pub mod device;
pub mod pairing;
pub mod profile;

pub use address::{ADDRESS_LEN, Address, AddressParseError};
pub use bond::{BondState, HalStatus, UnbondReason};
pub use device::{AddressType, ClassOfDevice, DeviceType, OobData, Transport};
pub use pairing::{PairingVariant, SspVariant};
pub use profile::{AccessKind, AccessPermission, ConnectionPolicy, Profile};
