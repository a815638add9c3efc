//! Identity consolidation for peers that bonded under two addresses.
//!
//! A peer may bond over LE with a resolvable address and later over BR/EDR
//! with its public address. Both resolve to the same identity, so the
//! LE-only record is stale once the newer bond completes.

use bondkeep_primitives::Address;
use bondkeep_registry::DeviceRegistry;
use tracing::{debug, error, info};

use crate::traits::BondGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consolidation {
    /// The bonded device has no known identity address.
    NoIdentity,
    NoDuplicate,
    /// The stale LE-only record was removed from the lower layer and the bonded collection.
    Evicted(Address),
    /// The lower layer refused the removal; the record is left in place.
    RemovalFailed(Address),
}

/// Evict the first LE-only bonded record that shares `address`'s identity
/// under a different address. Dual-mode records are never evicted.
pub fn cleanup_prev_bond_records<G>(registry: &DeviceRegistry, gateway: &G, address: Address) -> Consolidation
where
    G: BondGateway + ?Sized,
{
    let Some(identity) = registry.identity_of(&address) else {
        debug!(%address, "no identity address, skipping consolidation");
        return Consolidation::NoIdentity;
    };

    let duplicate = registry.bonded_devices().into_iter().find(|existing| {
        *existing != address
            && registry.get(existing).is_some_and(|device| {
                device.device_type().is_le_only() && device.resolved_identity() == Some(identity)
            })
    });

    let Some(existing) = duplicate else {
        return Consolidation::NoDuplicate;
    };

    if gateway.remove_bond(existing) {
        registry.remove_bonded(&existing);
        info!(%existing, %address, %identity, "removed old bond record");
        Consolidation::Evicted(existing)
    } else {
        error!(%existing, %address, "unexpected error while removing old bond record");
        Consolidation::RemovalFailed(existing)
    }
}
