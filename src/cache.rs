//! Lookup memoization
//!
//! Results are kept for the life of the cache: there is no eviction or
//! expiry. Empty results are never stored, so a transient failure cannot
//! shadow a later successful lookup.

use crate::address::Ipv4Address;
use crate::record::GeoRecord;
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe map from address to merged record
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: Mutex<FxHashMap<Ipv4Address, GeoRecord>>,
}

impl LookupCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record for `ip`
    pub fn get(&self, ip: Ipv4Address) -> Option<GeoRecord> {
        self.lock().get(&ip).cloned()
    }

    /// Store `record` for `ip`.
    ///
    /// Returns `false` (and stores nothing) for an empty record.
    pub fn insert(&self, ip: Ipv4Address, record: &GeoRecord) -> bool {
        if record.is_empty() {
            return false;
        }
        self.lock().insert(ip, record.clone());
        true
    }

    /// Number of cached addresses
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds nothing
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, FxHashMap<Ipv4Address, GeoRecord>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
