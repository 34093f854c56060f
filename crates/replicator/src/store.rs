//! # Replicated Key-Value Store
//!
//! Application-facing adapter: `put(key, bytes)` stores the payload through
//! the [`ReplicationCoordinator`] and remembers `key → content root`;
//! `get(key)` looks the root up and fetches it through the
//! [`DownloadResolver`].
//!
//! ## Key Table
//!
//! - Held in memory only. Re-putting a key overwrites its root.
//! - Two keys with identical payloads share one root but keep two records.
//! - An unknown key fails without any chain or provider call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use pinset_chain::{ChainQuery, TxBroadcaster};
use pinset_common::{ChunkTreeBuilder, ContentRoot, ReplicationConfig};
use tracing::{debug, info};

use crate::cancel::CancellationToken;
use crate::coordinator::{ReplicationCoordinator, ReplicationReceipt};
use crate::error::{ReplicationError, StoreError};
use crate::queue::TransactionQueue;
use crate::registry::ProviderRegistry;
use crate::resolver::DownloadResolver;
use crate::subscription::{check_subscription, SubscriptionStatus};

// ════════════════════════════════════════════════════════════════════════════
// TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Byte store addressed by application keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Stores `payload` under `key`, replacing any previous value.
    async fn put(&self, key: &[u8], payload: Bytes) -> Result<(), StoreError>;

    /// Returns the payload last stored under `key`.
    async fn get(&self, key: &[u8]) -> Result<Bytes, StoreError>;
}

// ════════════════════════════════════════════════════════════════════════════
// REPLICATED STORE
// ════════════════════════════════════════════════════════════════════════════

/// [`KvStore`] backed by storage deals and provider replicas.
pub struct ReplicatedStore {
    queue: Arc<TransactionQueue>,
    chain: Arc<dyn ChainQuery>,
    coordinator: ReplicationCoordinator,
    resolver: DownloadResolver,
    keys: RwLock<HashMap<Vec<u8>, ContentRoot>>,
    cancel: CancellationToken,
}

impl ReplicatedStore {
    /// Wires the queue, coordinator, and resolver together and starts the
    /// queue worker. Must run inside a Tokio runtime.
    pub fn start(
        chain: Arc<dyn ChainQuery>,
        broadcaster: Arc<dyn TxBroadcaster>,
        registry: Arc<ProviderRegistry>,
        config: ReplicationConfig,
    ) -> Result<Self, ReplicationError> {
        let queue = Arc::new(TransactionQueue::new(broadcaster));
        let coordinator = ReplicationCoordinator::new(
            Arc::clone(&queue),
            Arc::clone(&chain),
            Arc::new(ChunkTreeBuilder),
            registry,
            config,
        )?;
        queue.listen()?;
        let resolver = DownloadResolver::new(Arc::clone(&chain), coordinator.client().clone());

        info!(account = %queue.account_address(), "replicated store started");
        Ok(Self {
            queue,
            chain,
            coordinator,
            resolver,
            keys: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Stores `payload` under `key` and returns the replication receipt.
    pub async fn store(&self, key: &[u8], payload: Bytes) -> Result<ReplicationReceipt, StoreError> {
        let receipt = self.coordinator.post_file(payload, key, &self.cancel).await?;
        let previous = self.keys.write().insert(key.to_vec(), receipt.root);
        info!(
            key = %hex::encode(key),
            root = %receipt.root.short(),
            replicas = receipt.accepted.len(),
            replaced = previous.is_some(),
            "key stored"
        );
        Ok(receipt)
    }

    /// Content root currently recorded for `key`.
    pub fn root_for(&self, key: &[u8]) -> Option<ContentRoot> {
        self.keys.read().get(key).copied()
    }

    /// Number of recorded keys.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// Whether no key has been stored.
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Blacklist used for uploads.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        self.coordinator.registry()
    }

    /// Token that aborts every in-flight and future operation when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Storage subscription of the signing account at `now_unix`.
    pub async fn subscription_status(&self, now_unix: u64) -> SubscriptionStatus {
        check_subscription(
            self.chain.as_ref(),
            &self.queue.account_address(),
            now_unix,
            self.coordinator.config().subscription_window_secs,
        )
        .await
    }

    /// Cancels outstanding work and stops the queue worker.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.queue.shutdown().await;
        info!("replicated store stopped");
    }
}

#[async_trait]
impl KvStore for ReplicatedStore {
    async fn put(&self, key: &[u8], payload: Bytes) -> Result<(), StoreError> {
        self.store(key, payload).await.map(|_| ())
    }

    async fn get(&self, key: &[u8]) -> Result<Bytes, StoreError> {
        let root = self
            .root_for(key)
            .ok_or_else(|| StoreError::NotFound(hex::encode(key)))?;
        debug!(key = %hex::encode(key), root = %root.short(), "fetching key");
        Ok(self.resolver.download(&root, &self.cancel).await?)
    }
}

impl std::fmt::Debug for ReplicatedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicatedStore")
            .field("keys", &self.keys.read().len())
            .field("coordinator", &self.coordinator)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
