//! Errors raised inside the machine. None of them leave the command surface.

use bondkeep_primitives::{Address, BondState};
use strum::Display;
use thiserror::Error;

/// Lower-layer operation that can be rejected synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum GatewayOp {
    CreateBond,
    CreateBondOutOfBand,
    RemoveBond,
    CancelBond,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BondError {
    #[error("{address} is {state}, expected {expected}")]
    UnexpectedBondState {
        address: Address,
        state: BondState,
        expected: BondState,
    },

    #[error("lower layer rejected {operation} for {address}")]
    GatewayRejected { operation: GatewayOp, address: Address },

    #[error("withheld bonded entry for {address} has bond state {state}")]
    WithheldStateMismatch { address: Address, state: BondState },

    #[error("deadline for {address} fired with {previous} => {current}")]
    InvalidDeadline {
        address: Address,
        previous: BondState,
        current: BondState,
    },

    #[error("bonded callback for {address} with no command in flight")]
    UnexpectedBonded { address: Address },
}

impl BondError {
    /// Whether this error means the lower layer broke an ordering invariant.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::WithheldStateMismatch { .. } | Self::UnexpectedBonded { .. }
        )
    }
}
