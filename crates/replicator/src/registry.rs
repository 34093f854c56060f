//! Provider blacklist.
//!
//! Providers that fail an upload for any reason other than a capacity
//! rejection are excluded from upload selection for the lifetime of the
//! registry. There is no expiry. Retrieval never consults this list.

use std::collections::HashSet;

use parking_lot::RwLock;

/// Session-scoped set of blacklisted provider addresses.
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    blacklisted: RwLock<HashSet<String>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `address` must not be chosen as an upload target.
    pub fn is_blacklisted(&self, address: &str) -> bool {
        self.blacklisted.read().contains(address)
    }

    /// Excludes `address` from future uploads. Returns `true` if it was newly added.
    pub fn mark_blacklisted(&self, address: &str) -> bool {
        self.blacklisted.write().insert(address.to_string())
    }

    /// Number of blacklisted providers.
    pub fn len(&self) -> usize {
        self.blacklisted.read().len()
    }

    /// Whether no provider is blacklisted.
    pub fn is_empty(&self) -> bool {
        self.blacklisted.read().is_empty()
    }

    /// Sorted copy of the blacklisted addresses.
    pub fn snapshot(&self) -> Vec<String> {
        let mut out: Vec<String> = self.blacklisted.read().iter().cloned().collect();
        out.sort();
        out
    }
}
