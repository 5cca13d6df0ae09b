//! IPv4 address value type
//!
//! Both database formats key their ranges on a plain 32-bit unsigned
//! integer. `Ipv4Address` is that integer, with strict dotted-decimal
//! parsing so malformed input is rejected before any file is touched.

use crate::error::{LocationError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// A numeric IPv4 address (host byte order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Ipv4Address(u32);

impl Ipv4Address {
    /// Lowest address, `0.0.0.0`
    pub const MIN: Ipv4Address = Ipv4Address(0);
    /// Highest address, `255.255.255.255`
    pub const MAX: Ipv4Address = Ipv4Address(u32::MAX);

    /// Build an address from its four octets
    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(u32::from_be_bytes([a, b, c, d]))
    }

    /// The address as an unsigned integer
    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// The four octets, most significant first
    #[inline]
    pub const fn octets(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Network-order encoding
    #[inline]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Parse a dotted-decimal address.
    ///
    /// Exactly four octets in `0..=255`, decimal digits only.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || LocationError::InvalidAddress(text.to_string());

        let mut octets = [0u8; 4];
        let mut parts = text.split('.');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let value: u16 = part.parse().map_err(|_| invalid())?;
            *octet = u8::try_from(value).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Ipv4Address(u32::from_be_bytes(octets)))
    }
}

impl FromStr for Ipv4Address {
    type Err = LocationError;

    fn from_str(s: &str) -> Result<Self> {
        Ipv4Address::parse(s)
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.octets();
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl From<u32> for Ipv4Address {
    fn from(value: u32) -> Self {
        Ipv4Address(value)
    }
}

impl From<Ipv4Address> for u32 {
    fn from(addr: Ipv4Address) -> Self {
        addr.0
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(u32::from(addr))
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl From<Ipv4Address> for String {
    fn from(addr: Ipv4Address) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for Ipv4Address {
    type Error = LocationError;

    fn try_from(value: String) -> Result<Self> {
        Ipv4Address::parse(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let addr: Ipv4Address = "202.113.245.255".parse().unwrap();
        assert_eq!(addr.octets(), [202, 113, 245, 255]);
        assert_eq!(addr.to_u32(), 202 * 16777216 + 113 * 65536 + 245 * 256 + 255);
        assert_eq!(addr.to_string(), "202.113.245.255");

        assert_eq!(Ipv4Address::parse("0.0.0.0").unwrap(), Ipv4Address::MIN);
        assert_eq!(Ipv4Address::parse("255.255.255.255").unwrap(), Ipv4Address::MAX);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "a.b.c.d",
            "1.2.3",
            "1.2.3.4.5",
            "256.1.1.1",
            "1.2.3.-4",
            "1..3.4",
            "",
            " 1.2.3.4",
            "1.2.3.4 ",
            "+1.2.3.4",
            "0001.2.3.4",
        ] {
            assert!(
                matches!(Ipv4Address::parse(bad), Err(LocationError::InvalidAddress(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_std_conversions() {
        let std_addr = Ipv4Addr::new(8, 8, 4, 4);
        let addr = Ipv4Address::from(std_addr);
        assert_eq!(addr, Ipv4Address::new(8, 8, 4, 4));
        assert_eq!(Ipv4Addr::from(addr), std_addr);
        assert_eq!(addr.to_be_bytes(), [8, 8, 4, 4]);
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Ipv4Address::new(10, 0, 0, 1);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"10.0.0.1\"");
        let back: Ipv4Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Ipv4Address>("\"10.0.0\"").is_err());
    }
}
