//! Pairing request variants.

use serde::{Deserialize, Serialize};
use strum::Display;

/// SSP variant as reported by the lower layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum SspVariant {
    PasskeyConfirmation = 0,
    PasskeyEntry = 1,
    Consent = 2,
    PasskeyNotification = 3,
}

impl SspVariant {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::PasskeyConfirmation),
            1 => Some(Self::PasskeyEntry),
            2 => Some(Self::Consent),
            3 => Some(Self::PasskeyNotification),
            _ => None,
        }
    }

    /// Presentation variant and whether the passkey is shown with it.
    pub fn presentation(&self) -> (PairingVariant, bool) {
        match self {
            Self::PasskeyConfirmation => (PairingVariant::PasskeyConfirmation, true),
            Self::Consent => (PairingVariant::Consent, false),
            Self::PasskeyEntry => (PairingVariant::Passkey, false),
            Self::PasskeyNotification => (PairingVariant::DisplayPasskey, true),
        }
    }
}

/// Variant presented to the consent surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum PairingVariant {
    Pin = 0,
    Passkey = 1,
    PasskeyConfirmation = 2,
    Consent = 3,
    DisplayPasskey = 4,
    DisplayPin = 5,
    OobConsent = 6,
    Pin16Digits = 7,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssp_presentation() {
        assert_eq!(
            SspVariant::PasskeyConfirmation.presentation(),
            (PairingVariant::PasskeyConfirmation, true)
        );
        assert_eq!(
            SspVariant::PasskeyNotification.presentation(),
            (PairingVariant::DisplayPasskey, true)
        );
        assert_eq!(
            SspVariant::PasskeyEntry.presentation(),
            (PairingVariant::Passkey, false)
        );
        assert_eq!(SspVariant::Consent.presentation(), (PairingVariant::Consent, false));
        assert_eq!(SspVariant::from_code(4), None);
    }
}
