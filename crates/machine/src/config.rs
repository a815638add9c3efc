//! Machine configuration (TOML-serializable).

use std::time::Duration;

use bondkeep_primitives::ClassOfDevice;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Bonding state machine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondMachineConfig {
    /// Backoff between busy retries of a create, in milliseconds.
    #[serde(default = "default_bond_retry_delay_ms")]
    pub bond_retry_delay_ms: u64,

    /// Busy retries before the create is attempted regardless.
    #[serde(default = "default_max_bond_retries")]
    pub max_bond_retries: u32,

    /// Deadline for service discovery after a link-level bond, in milliseconds.
    #[serde(default = "default_pending_bonded_timeout_ms")]
    pub pending_bonded_timeout_ms: u64,

    /// Accessories that are confirmed without the consent surface when
    /// bonding was initiated locally.
    #[serde(default = "default_skip_confirmation_accessories")]
    pub skip_confirmation_accessories: Vec<SkipConfirmationAccessory>,
}

/// Name and device class pair of an accessory that pairs without a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipConfirmationAccessory {
    pub name: String,
    /// Major and minor device class bits (see [`ClassOfDevice::device_class`]).
    pub device_class: u32,
}

impl Default for BondMachineConfig {
    fn default() -> Self {
        Self {
            bond_retry_delay_ms: default_bond_retry_delay_ms(),
            max_bond_retries: default_max_bond_retries(),
            pending_bonded_timeout_ms: default_pending_bonded_timeout_ms(),
            skip_confirmation_accessories: default_skip_confirmation_accessories(),
        }
    }
}

impl BondMachineConfig {
    pub fn bond_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bond_retry_delay_ms)
    }

    pub fn pending_bonded_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_bonded_timeout_ms)
    }

    pub fn is_skip_confirmation_accessory(&self, name: Option<&str>, class: ClassOfDevice) -> bool {
        let Some(name) = name else {
            return false;
        };
        self.skip_confirmation_accessories
            .iter()
            .any(|entry| entry.name == name && entry.device_class == class.device_class())
    }
}

fn default_bond_retry_delay_ms() -> u64 {
    DEFAULT_BOND_RETRY_DELAY_MS
}

fn default_max_bond_retries() -> u32 {
    DEFAULT_MAX_BOND_RETRIES
}

fn default_pending_bonded_timeout_ms() -> u64 {
    DEFAULT_PENDING_BONDED_TIMEOUT_MS
}

fn default_skip_confirmation_accessories() -> Vec<SkipConfirmationAccessory> {
    vec![
        SkipConfirmationAccessory {
            name: "SHIELD Remote".to_string(),
            device_class: ClassOfDevice::PERIPHERAL_REMOTE,
        },
        SkipConfirmationAccessory {
            name: "NVIDIA Controller v01.04".to_string(),
            device_class: ClassOfDevice::PERIPHERAL_GAMEPAD,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BondMachineConfig::default();
        assert_eq!(config.bond_retry_delay(), Duration::from_millis(500));
        assert_eq!(config.max_bond_retries, 30);
        assert_eq!(config.pending_bonded_timeout(), Duration::from_secs(3));
        assert_eq!(config.skip_confirmation_accessories.len(), 2);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: BondMachineConfig = toml::from_str("max_bond_retries = 3").unwrap();
        assert_eq!(config.max_bond_retries, 3);
        assert_eq!(config.bond_retry_delay_ms, DEFAULT_BOND_RETRY_DELAY_MS);
        assert_eq!(config.skip_confirmation_accessories.len(), 2);
    }

    #[test]
    fn test_skip_confirmation_matches_name_and_class() {
        let config = BondMachineConfig::default();
        // Service class bits above the device class are ignored.
        let remote = ClassOfDevice::new(0x20_050C);
        assert!(config.is_skip_confirmation_accessory(Some("SHIELD Remote"), remote));
        assert!(!config.is_skip_confirmation_accessory(Some("SHIELD Remote"), ClassOfDevice::new(0x0508)));
        assert!(!config.is_skip_confirmation_accessory(Some("Other Remote"), remote));
        assert!(!config.is_skip_confirmation_accessory(None, remote));
    }
}
