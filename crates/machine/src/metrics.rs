//! Bonding counters.

use metrics::Counter;

#[derive(Clone, Debug)]
pub(crate) struct BondMetrics {
    /// Creates handed to the lower layer.
    pub(crate) create_requested_total: Counter,
    /// Creates delayed because the lower layer was busy.
    pub(crate) create_busy_retries_total: Counter,
    /// Creates the lower layer refused synchronously.
    pub(crate) create_rejected_total: Counter,
    /// Bonded notifications withheld for service discovery.
    pub(crate) bonded_deferred_total: Counter,
    /// Withheld notifications forced through by the deadline.
    pub(crate) bonded_deadline_fired_total: Counter,
    pub(crate) consolidation_evicted_total: Counter,
    pub(crate) invariant_violations_total: Counter,
}

impl Default for BondMetrics {
    fn default() -> Self {
        Self {
            create_requested_total: metrics::counter!("bond.create.requested_total"),
            create_busy_retries_total: metrics::counter!("bond.create.busy_retries_total"),
            create_rejected_total: metrics::counter!("bond.create.rejected_total"),
            bonded_deferred_total: metrics::counter!("bond.bonded.deferred_total"),
            bonded_deadline_fired_total: metrics::counter!("bond.bonded.deadline_fired_total"),
            consolidation_evicted_total: metrics::counter!("bond.consolidation.evicted_total"),
            invariant_violations_total: metrics::counter!("bond.invariant_violations_total"),
        }
    }
}
