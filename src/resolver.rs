//! Turning caller input into a numeric address
//!
//! The decoders only ever see [`Ipv4Address`] values. Hostname resolution
//! sits behind the [`Resolver`] trait so callers can plug in their own (or
//! refuse names entirely with [`NumericResolver`]).

use crate::address::Ipv4Address;
use crate::error::{LocationError, Result};
use std::net::{IpAddr, ToSocketAddrs};

/// Resolves lookup input to an IPv4 address
pub trait Resolver: Send + Sync {
    /// Resolve `query`; any failure is [`LocationError::InvalidAddress`]
    fn resolve(&self, query: &str) -> Result<Ipv4Address>;
}

/// Accepts dotted-decimal input only
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericResolver;

impl Resolver for NumericResolver {
    fn resolve(&self, query: &str) -> Result<Ipv4Address> {
        Ipv4Address::parse(query)
    }
}

/// Dotted-decimal input, falling back to the platform resolver for names
///
/// Only input shaped like a hostname reaches DNS: ASCII letters, digits,
/// dots and hyphens, with at least one letter or hyphen. Anything else is
/// rejected locally. Note that a name such as `a.b.c.d` is a valid
/// hostname and is sent to the platform resolver; use [`NumericResolver`]
/// to keep lookups offline.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, query: &str) -> Result<Ipv4Address> {
        if let Ok(addr) = Ipv4Address::parse(query) {
            return Ok(addr);
        }
        if !looks_like_hostname(query) {
            return Err(LocationError::InvalidAddress(query.to_string()));
        }

        let addrs = (query, 0u16).to_socket_addrs().map_err(|e| {
            LocationError::InvalidAddress(format!("cannot resolve {}: {}", query, e))
        })?;
        addrs
            .filter_map(|sa| match sa.ip() {
                IpAddr::V4(v4) => Some(Ipv4Address::from(v4)),
                IpAddr::V6(_) => None,
            })
            .next()
            .ok_or_else(|| {
                LocationError::InvalidAddress(format!("{} has no IPv4 address", query))
            })
    }
}

/// Digits and dots alone are a malformed address, not a name
fn looks_like_hostname(query: &str) -> bool {
    let bytes = query.as_bytes();
    !bytes.is_empty()
        && bytes
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'.' || b == b'-')
        && bytes.iter().any(|&b| b.is_ascii_alphabetic() || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_resolver() {
        let resolver = NumericResolver;
        assert_eq!(
            resolver.resolve("202.113.245.255").unwrap(),
            Ipv4Address::new(202, 113, 245, 255)
        );
        assert!(matches!(
            resolver.resolve("a.b.c.d"),
            Err(LocationError::InvalidAddress(_))
        ));
        assert!(matches!(
            resolver.resolve("localhost"),
            Err(LocationError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_system_resolver_numeric_paths() {
        let resolver = SystemResolver;
        assert_eq!(resolver.resolve("8.8.8.8").unwrap(), Ipv4Address::new(8, 8, 8, 8));
        assert!(matches!(
            resolver.resolve("300.1.1.1"),
            Err(LocationError::InvalidAddress(_))
        ));
        assert!(matches!(resolver.resolve(""), Err(LocationError::InvalidAddress(_))));
    }

    #[test]
    fn test_system_resolver_rejects_non_names_locally() {
        let resolver = SystemResolver;
        for bad in ["1.2.3", "1..2.3", "1.2.3.4:80", "::1", "10.0.0.1/8", "a b", "例子.中国"] {
            assert!(
                matches!(resolver.resolve(bad), Err(LocationError::InvalidAddress(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_hostname_shape() {
        assert!(looks_like_hostname("example.com"));
        assert!(looks_like_hostname("a.b.c.d"));
        assert!(looks_like_hostname("host-1"));
        assert!(!looks_like_hostname(""));
        assert!(!looks_like_hostname("1.2.3.4.5"));
        assert!(!looks_like_hostname("1.2.3.4:80"));
    }
}
