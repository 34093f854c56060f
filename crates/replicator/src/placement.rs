//! # Upload Placement
//!
//! Builds the ordered list of upload candidates for one deal.
//!
//! ## Policy
//!
//! 1. Deal-assigned providers first, in the order the chain assigned them.
//! 2. Then the provider directory, shuffled, to spread load instead of
//!    hammering whoever is listed first.
//! 3. Blacklisted providers never appear. Duplicates never appear.
//!
//! The list is longer than the replica target on purpose: later entries
//! are fallbacks for candidates that skip or fail.
//!
//! An assigned endpoint with no directory record is keyed by its URL, in
//! the plan and in the blacklist. A failure recorded under that URL does
//! not follow the provider once it is listed under its address.

use std::collections::{HashMap, HashSet};

use pinset_chain::ProviderRecord;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::registry::ProviderRegistry;
use crate::uploader::normalize_endpoint;

/// An upload target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provider {
    /// On-chain address. For an assigned endpoint missing from the
    /// directory this is the endpoint itself.
    pub address: String,
    /// Base URL of the provider's HTTP API.
    pub endpoint: String,
}

impl Provider {
    /// Creates a provider from its address and base URL.
    pub fn new(address: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl From<ProviderRecord> for Provider {
    fn from(r: ProviderRecord) -> Self {
        Self {
            address: r.address,
            endpoint: r.ip,
        }
    }
}

/// Orders upload candidates for a deal.
pub fn plan_candidates<R: Rng + ?Sized>(
    assigned: &[String],
    mut directory: Vec<ProviderRecord>,
    registry: &ProviderRegistry,
    rng: &mut R,
) -> Vec<Provider> {
    let by_endpoint: HashMap<String, String> = directory
        .iter()
        .map(|r| (normalize_endpoint(&r.ip), r.address.clone()))
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(assigned.len() + directory.len());

    for ip in assigned {
        let address = by_endpoint
            .get(&normalize_endpoint(ip))
            .cloned()
            .unwrap_or_else(|| ip.clone());
        if registry.is_blacklisted(&address) || !seen.insert(address.clone()) {
            continue;
        }
        out.push(Provider::new(address, ip.clone()));
    }

    directory.shuffle(rng);
    for record in directory {
        if registry.is_blacklisted(&record.address) || !seen.insert(record.address.clone()) {
            continue;
        }
        out.push(record.into());
    }
    out
}
