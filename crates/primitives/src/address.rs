//! Six-byte device address rendered as colon-hex.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a device address in bytes.
pub const ADDRESS_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("expected 6 colon-separated octets, got {0}")]
    OctetCount(usize),
    #[error("invalid octet {octet:?} at position {position}")]
    InvalidOctet { position: usize, octet: String },
}

/// Transport-specific device address (`AA:BB:CC:DD:EE:FF`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const ANY: Self = Self([0; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub const fn to_bytes(self) -> [u8; ADDRESS_LEN] {
        self.0
    }

    /// Address with the first four octets masked, for logs.
    pub fn redacted(&self) -> String {
        format!("XX:XX:XX:XX:{:02X}:{:02X}", self.0[4], self.0[5])
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.split(':').collect();
        if octets.len() != ADDRESS_LEN {
            return Err(AddressParseError::OctetCount(octets.len()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        for (position, (slot, octet)) in bytes.iter_mut().zip(&octets).enumerate() {
            if octet.len() != 2 {
                return Err(AddressParseError::InvalidOctet {
                    position,
                    octet: (*octet).to_string(),
                });
            }
            *slot = u8::from_str_radix(octet, 16).map_err(|_| AddressParseError::InvalidOctet {
                position,
                octet: (*octet).to_string(),
            })?;
        }

        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let addr = Address::new([0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!("aa:bb:cc:dd:ee:ff".parse::<Address>().unwrap(), addr);
        assert_eq!(addr.redacted(), "XX:XX:XX:XX:EE:FF");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "AA:BB:CC".parse::<Address>(),
            Err(AddressParseError::OctetCount(3))
        );
        assert!(matches!(
            "AA:BB:CC:DD:EE:GG".parse::<Address>(),
            Err(AddressParseError::InvalidOctet { position: 5, .. })
        ));
        assert!(matches!(
            "AA:BB:CC:DD:EE:F".parse::<Address>(),
            Err(AddressParseError::InvalidOctet { position: 5, .. })
        ));
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Address::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"00:11:22:33:44:55\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
