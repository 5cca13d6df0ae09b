//! The public lookup service
//!
//! An [`IpLocator`] owns both decoders, the memoization cache and the
//! resolver. It is `Send + Sync`; share it behind an `Arc` to serve lookups
//! from several threads. Each decoder serializes its own file access, so the
//! two sources never block each other.

use crate::address::Ipv4Address;
use crate::cache::LookupCache;
use crate::config::{LocatorOptions, SetupOptions};
use crate::cz88::Cz88Decoder;
use crate::error::Result;
use crate::ipip::IpipDecoder;
use crate::merge::RecordMerger;
use crate::record::{GeoRecord, Lookup};
use crate::resolver::{Resolver, SystemResolver};
use std::sync::{PoisonError, RwLock};

/// IPv4 geolocation over a qqwry and an ipip database
///
/// # Example
///
/// ```no_run
/// use iplocate::{IpLocator, LocatorOptions};
///
/// let locator = IpLocator::new(LocatorOptions::new("db/qqwry.dat", "db/17monipdb.datx"));
/// match locator.lookup("202.113.245.255")? {
///     Some(record) => println!("{} {} {} {}", record.country, record.province, record.county, record.isp),
///     None => println!("unknown"),
/// }
/// # Ok::<(), iplocate::LocationError>(())
/// ```
pub struct IpLocator {
    options: RwLock<LocatorOptions>,
    cz88: Cz88Decoder,
    ipip: IpipDecoder,
    cache: LookupCache,
    resolver: Box<dyn Resolver>,
}

impl IpLocator {
    /// Create a locator using the platform resolver for hostnames.
    ///
    /// No file is touched until the first lookup. Input that is not
    /// dotted-decimal but is shaped like a hostname (including `a.b.c.d`)
    /// is sent to DNS; see [`SystemResolver`]. Use
    /// [`with_resolver`](Self::with_resolver) with
    /// [`NumericResolver`](crate::resolver::NumericResolver) to reject names
    /// without network access.
    pub fn new(options: LocatorOptions) -> Self {
        Self::with_resolver(options, SystemResolver)
    }

    /// Create a locator with a custom resolver
    pub fn with_resolver<R: Resolver + 'static>(options: LocatorOptions, resolver: R) -> Self {
        Self {
            cz88: Cz88Decoder::new(options.cz88_settings()),
            ipip: IpipDecoder::new(&options.ipip_db),
            options: RwLock::new(options),
            cache: LookupCache::new(),
            resolver: Box::new(resolver),
        }
    }

    /// Look up an address or hostname.
    ///
    /// Returns `Ok(None)` when no location is known. Input that does not
    /// resolve fails with `InvalidAddress` before any database is opened;
    /// a database that cannot be opened fails with `InvalidDatabase`.
    pub fn lookup(&self, query: &str) -> Result<Option<GeoRecord>> {
        let ip = self.resolver.resolve(query.trim())?;
        self.lookup_ip(ip)
    }

    /// Look up an already-numeric address
    pub fn lookup_ip(&self, ip: Ipv4Address) -> Result<Option<GeoRecord>> {
        // Held for the whole lookup so `setup` cannot interleave with it
        let _options = self.options.read().unwrap_or_else(PoisonError::into_inner);

        if let Some(record) = self.cache.get(ip) {
            log::trace!("cache hit for {}", ip);
            return Ok(Some(record));
        }

        let primary = self.ipip.lookup(ip)?;
        let secondary = self.cz88.lookup(ip)?;
        if let Some(reason) = system_error(&primary) {
            log::warn!("ipip lookup of {} failed: {}", ip, reason);
        }
        if let Some(reason) = system_error(&secondary) {
            log::warn!("cz88 lookup of {} failed: {}", ip, reason);
        }

        let merged = RecordMerger::combine(&primary, &secondary);
        if let Some(record) = &merged {
            self.cache.insert(ip, record);
        }
        Ok(merged)
    }

    /// Apply a configuration update.
    ///
    /// Changed decoders close their file handles (and, for ipip, drop the
    /// loaded index) so the next lookup reopens the new files. The cache is
    /// cleared whenever anything changes.
    pub fn setup(&self, update: &SetupOptions) {
        if update.is_empty() {
            return;
        }

        let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
        let before = options.clone();
        options.apply(update);

        if options.cz88_settings() != before.cz88_settings() {
            self.cz88.reconfigure(options.cz88_settings());
        }
        if options.ipip_db != before.ipip_db {
            self.ipip.reconfigure(&options.ipip_db);
        }
        self.cache.clear();
        log::debug!("locator reconfigured: {:?}", *options);
    }

    /// Current configuration
    pub fn options(&self) -> LocatorOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The memoization cache
    pub fn cache(&self) -> &LookupCache {
        &self.cache
    }

    /// The qqwry decoder
    pub fn cz88(&self) -> &Cz88Decoder {
        &self.cz88
    }

    /// The ipip decoder
    pub fn ipip(&self) -> &IpipDecoder {
        &self.ipip
    }
}

impl Default for IpLocator {
    fn default() -> Self {
        Self::new(LocatorOptions::default())
    }
}

fn system_error<T>(outcome: &Lookup<T>) -> Option<&str> {
    match outcome {
        Lookup::SystemError(reason) => Some(reason),
        _ => None,
    }
}
