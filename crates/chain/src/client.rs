//! # Chain Access Traits
//!
//! Replication talks to the storage chain through two narrow traits:
//!
//! - [`ChainQuery`]: read-only queries (parameters, provider directory,
//!   hosting lookup, payment status, latest height).
//! - [`TxBroadcaster`]: signs, broadcasts, and waits for commit of one
//!   chain-mutating message.
//!
//! Both decouple replication logic from any concrete RPC client or wallet.
//! [`crate::mock::MockChain`] implements both for tests.
//!
//! ## Contract
//!
//! - Implementations MUST NOT retry internally.
//! - Implementations MUST NOT panic.
//! - `broadcast_commit` MUST return only after the transaction is committed
//!   (or has definitively failed). Callers rely on this to serialize
//!   account sequence numbers.

use std::collections::HashSet;

use async_trait::async_trait;
use pinset_common::ContentRoot;
use thiserror::Error;

use crate::msg::ChainMsg;
use crate::types::{
    ChainParams, PageRequest, ProviderPage, ProviderRecord, StoragePaymentInfo, TxResult,
};

// ════════════════════════════════════════════════════════════════════════════
// ERROR
// ════════════════════════════════════════════════════════════════════════════

/// Errors from chain queries and broadcasts.
///
/// A committed transaction with a non-zero code is NOT an error here; it is
/// reported through [`TxResult::code`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Transport-level network failure.
    #[error("chain transport error: {0}")]
    Transport(String),

    /// Request timed out before the chain responded.
    #[error("chain request timed out")]
    Timeout,

    /// The queried object does not exist.
    #[error("not found on chain: {0}")]
    NotFound(String),

    /// Signing or local transaction assembly failed.
    #[error("failed to sign transaction: {0}")]
    Signing(String),
}

// ════════════════════════════════════════════════════════════════════════════
// TRAITS
// ════════════════════════════════════════════════════════════════════════════

/// Read-only chain queries used by replication and retrieval.
#[async_trait]
pub trait ChainQuery: Send + Sync {
    /// Storage module parameters.
    async fn params(&self) -> Result<ChainParams, ChainError>;

    /// Height of the latest committed block.
    async fn latest_height(&self) -> Result<i64, ChainError>;

    /// One page of the global provider directory.
    async fn all_providers(&self, page: &PageRequest) -> Result<ProviderPage, ChainError>;

    /// Provider endpoints currently reported to host `root`, in chain order.
    async fn find_file(&self, root: &ContentRoot) -> Result<Vec<String>, ChainError>;

    /// Storage subscription of `account`.
    async fn storage_payment_info(&self, account: &str) -> Result<StoragePaymentInfo, ChainError>;
}

/// Signs and broadcasts a message, waiting for commit.
#[async_trait]
pub trait TxBroadcaster: Send + Sync {
    /// Address of the signing account.
    fn account_address(&self) -> String;

    /// Signs `msg`, broadcasts it, and returns the committed result.
    async fn broadcast_commit(&self, msg: &ChainMsg) -> Result<TxResult, ChainError>;
}

/// Fetches every provider directory page, following continuation keys.
pub async fn list_all_providers(
    chain: &dyn ChainQuery,
    limit: u64,
) -> Result<Vec<ProviderRecord>, ChainError> {
    let mut request = PageRequest::first(limit);
    let mut providers = Vec::new();
    let mut seen_keys: HashSet<Vec<u8>> = HashSet::new();
    loop {
        let page = chain.all_providers(&request).await?;
        let fetched = page.providers.len();
        providers.extend(page.providers);
        match page.next_key {
            // A repeated key would page forever.
            Some(key) if !key.is_empty() && fetched > 0 && seen_keys.insert(key.clone()) => {
                request.key = Some(key)
            }
            _ => break,
        }
    }
    Ok(providers)
}
