//! Transport, device type and class-of-device values.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::address::Address;

/// Transport a bond is requested over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum Transport {
    #[default]
    Auto = 0,
    /// BR/EDR.
    Classic = 1,
    Le = 2,
}

/// Device type as learned from the lower layer's property callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceType {
    #[default]
    Unknown = 0,
    Classic = 1,
    Le = 2,
    Dual = 3,
}

impl DeviceType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Classic,
            2 => Self::Le,
            3 => Self::Dual,
            _ => Self::Unknown,
        }
    }

    pub fn is_le_only(&self) -> bool {
        matches!(self, Self::Le)
    }

    /// Whether the device's own address is a classic (public, stable) address.
    pub fn has_classic_identity(&self) -> bool {
        matches!(self, Self::Classic | Self::Dual)
    }
}

/// LE address type passed to the lower layer on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, Serialize, Deserialize)]
#[repr(u8)]
pub enum AddressType {
    #[default]
    Public = 0,
    Random = 1,
}

impl AddressType {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Random,
            _ => Self::Public,
        }
    }
}

/// Class of Device bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ClassOfDevice(pub u32);

impl ClassOfDevice {
    pub const MAJOR_PERIPHERAL: u32 = 0x0500;
    pub const PERIPHERAL_KEYBOARD: u32 = 0x0540;
    pub const PERIPHERAL_KEYBOARD_POINTING: u32 = 0x05C0;
    pub const PERIPHERAL_GAMEPAD: u32 = Self::MAJOR_PERIPHERAL | 0x08;
    pub const PERIPHERAL_REMOTE: u32 = Self::MAJOR_PERIPHERAL | 0x0C;

    const DEVICE_MASK: u32 = 0x1FFC;

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u32 {
        self.0
    }

    /// Major and minor device class bits.
    pub const fn device_class(&self) -> u32 {
        self.0 & Self::DEVICE_MASK
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(
            self.device_class(),
            Self::PERIPHERAL_KEYBOARD | Self::PERIPHERAL_KEYBOARD_POINTING
        )
    }
}

/// Out-of-band pairing material for one key generation (P-192 or P-256).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OobData {
    pub address: Address,
    pub confirmation_hash: [u8; 16],
    pub randomizer: [u8; 16],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
}
