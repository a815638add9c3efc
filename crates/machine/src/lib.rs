//! Bonding lifecycle orchestration.
//!
//! [`BondStateMachine`] serializes create, remove and cancel commands with
//! the lower layer's callbacks, retries creates while the lower layer is
//! busy, withholds the bonded notification until service discovery
//! completes, and evicts stale LE-only bond records of dual-identity peers.

pub mod config;
pub mod consolidate;
pub mod constants;
pub mod error;
pub mod event;
pub mod events;
pub mod machine;
mod metrics;
mod notify;
mod pairing;
pub mod timer;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::{BondMachineConfig, SkipConfirmationAccessory};
pub use consolidate::{Consolidation, cleanup_prev_bond_records};
pub use error::{BondError, GatewayOp};
pub use event::{BondEvent, CreateBondRequest};
pub use events::{BondStateChange, EventEmitter, LifecycleEvent, PairingRequest};
pub use machine::{BondStateMachine, MachineState};
pub use traits::{
    AccessPermissions, BondGateway, BondStateObserver, Collaborators, ConnectionPolicyReset,
    LifecycleSink, PairingConsent,
};
