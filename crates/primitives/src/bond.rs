//! Bond states and the status/reason codes attached to bond transitions.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Bond state of a remote device (stored as u8 for atomic operations).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum BondState {
    #[default]
    #[strum(serialize = "BOND_NONE")]
    None = 0,
    #[strum(serialize = "BOND_BONDING")]
    Bonding = 1,
    #[strum(serialize = "BOND_BONDED")]
    Bonded = 2,
}

impl BondState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Bonding,
            2 => Self::Bonded,
            _ => Self::None,
        }
    }

    /// Lower-layer bond state code. Anything unrecognised reads as `None`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Bonding,
            2 => Self::Bonded,
            _ => Self::None,
        }
    }

    pub fn is_bonded(&self) -> bool {
        matches!(self, Self::Bonded)
    }

    pub fn is_bonding(&self) -> bool {
        matches!(self, Self::Bonding)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Status reported by the lower layer alongside a bonding callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
pub enum HalStatus {
    Success,
    Fail,
    NotReady,
    NoMem,
    /// Retryable.
    Busy,
    Done,
    Unsupported,
    ParmInvalid,
    Unhandled,
    AuthFailure,
    RmtDevDown,
    AuthRejected,
    AuthTimeout,
    Other(i32),
}

impl HalStatus {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Success,
            1 => Self::Fail,
            2 => Self::NotReady,
            3 => Self::NoMem,
            4 => Self::Busy,
            5 => Self::Done,
            6 => Self::Unsupported,
            7 => Self::ParmInvalid,
            8 => Self::Unhandled,
            9 => Self::AuthFailure,
            10 => Self::RmtDevDown,
            11 => Self::AuthRejected,
            12 => Self::AuthTimeout,
            other => Self::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Fail => 1,
            Self::NotReady => 2,
            Self::NoMem => 3,
            Self::Busy => 4,
            Self::Done => 5,
            Self::Unsupported => 6,
            Self::ParmInvalid => 7,
            Self::Unhandled => 8,
            Self::AuthFailure => 9,
            Self::RmtDevDown => 10,
            Self::AuthRejected => 11,
            Self::AuthTimeout => 12,
            Self::Other(code) => *code,
        }
    }
}

/// Reason attached to a bond state notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnbondReason {
    #[default]
    BondSuccess = 0,
    AuthFailed = 1,
    AuthRejected = 2,
    AuthCanceled = 3,
    RemoteDeviceDown = 4,
    DiscoveryFailed = 5,
    AuthTimeout = 6,
    RepeatedAttempts = 7,
    RemoteAuthCanceled = 8,
    /// Explicitly removed, or an unrecognised failure.
    Removed = 9,
}

impl From<HalStatus> for UnbondReason {
    fn from(status: HalStatus) -> Self {
        match status {
            HalStatus::Success => Self::BondSuccess,
            HalStatus::RmtDevDown => Self::RemoteDeviceDown,
            HalStatus::AuthFailure => Self::AuthFailed,
            HalStatus::AuthRejected => Self::AuthRejected,
            HalStatus::AuthTimeout => Self::AuthTimeout,
            _ => Self::Removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bond_state_codes() {
        assert_eq!(BondState::from_code(0), BondState::None);
        assert_eq!(BondState::from_code(1), BondState::Bonding);
        assert_eq!(BondState::from_code(2), BondState::Bonded);
        assert_eq!(BondState::from_code(42), BondState::None);
        assert_eq!(BondState::from_u8(BondState::Bonded as u8), BondState::Bonded);
        assert_eq!(BondState::Bonding.to_string(), "BOND_BONDING");
    }

    #[test]
    fn test_hal_status_roundtrip_codes() {
        for code in 0..=12 {
            assert_eq!(HalStatus::from_code(code).code(), code);
        }
        assert_eq!(HalStatus::from_code(77), HalStatus::Other(77));
    }

    #[test]
    fn test_unbond_reason_from_status() {
        assert_eq!(UnbondReason::from(HalStatus::Success), UnbondReason::BondSuccess);
        assert_eq!(
            UnbondReason::from(HalStatus::RmtDevDown),
            UnbondReason::RemoteDeviceDown
        );
        assert_eq!(UnbondReason::from(HalStatus::AuthFailure), UnbondReason::AuthFailed);
        assert_eq!(
            UnbondReason::from(HalStatus::AuthRejected),
            UnbondReason::AuthRejected
        );
        assert_eq!(UnbondReason::from(HalStatus::AuthTimeout), UnbondReason::AuthTimeout);
        assert_eq!(UnbondReason::from(HalStatus::Busy), UnbondReason::Removed);
        assert_eq!(UnbondReason::from(HalStatus::Other(99)), UnbondReason::Removed);
    }
}
