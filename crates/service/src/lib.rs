//! Tokio actor around the bonding state machine.
//!
//! This crate implements the Handle+Service actor pattern:
//! - [`BondService`] owns the [`BondStateMachine`](bondkeep_machine::BondStateMachine)
//!   and runs in its own tokio task, sleeping until the next scheduled retry
//!   or bonded deadline
//! - [`BondHandle`] is cheap to clone and issues commands with oneshot replies
//! - [`CallbackHandle`] is what the lower layer calls into
//!
//! Use [`BondServiceBuilder`] to create the service and its handles.

pub mod callbacks;
pub mod config;
pub mod error;
pub mod handle;
pub mod loopback;
pub mod service;

pub use callbacks::{CallbackHandle, GatewayCallback};
pub use config::{LoopbackConfig, ServiceConfig};
pub use error::ServiceError;
pub use handle::{BondHandle, BondStatus};
pub use loopback::{HID_SERVICE_UUID, LoopbackGateway};
pub use service::{BondCommand, BondService, BondServiceBuilder};
