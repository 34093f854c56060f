//! # Pinset Replicator Crate
//!
//! Stores byte payloads on independently operated storage providers under
//! an on-chain storage deal, and reads them back with failover.
//!
//! ## Modules
//! - `queue`: single-worker FIFO for chain-mutating messages
//! - `uploader`: provider HTTP client (health, multipart upload, download)
//! - `registry`: session-scoped provider blacklist
//! - `placement`: candidate ordering (assigned first, shuffled directory)
//! - `coordinator`: deal submission plus concurrent replication
//! - `resolver`: failover download by content root
//! - `store`: `KvStore` adapter mapping application keys to roots
//! - `subscription`: storage subscription status
//! - `cancel`: cooperative cancellation token
//!
//! ## Architecture
//! ```text
//!            put(key, bytes)                 get(key)
//!                  │                            │
//!          ┌───────▼────────┐          ┌────────▼────────┐
//!          │ ReplicatedStore│──────────│  key → root map │
//!          └───────┬────────┘          └────────┬────────┘
//!   ┌──────────────▼──────────────┐   ┌─────────▼─────────┐
//!   │   ReplicationCoordinator    │   │  DownloadResolver │
//!   │  queue ─► chain  uploads ─► │   │  find_file ─► GET │
//!   └──────┬─────────────┬────────┘   └─────────┬─────────┘
//!          │             │                      │
//!   TransactionQueue  ProviderClient ◄──────────┘
//!          │             │
//!     TxBroadcaster   providers (HTTP)
//! ```

pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod placement;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod store;
pub mod subscription;
pub mod uploader;

pub use cancel::CancellationToken;
pub use coordinator::{ReplicationCoordinator, ReplicationReceipt, StorageDeal};
pub use error::{ReplicationError, RetrievalError, StoreError};
pub use placement::{plan_candidates, Provider};
pub use queue::{QueueError, TransactionQueue};
pub use registry::ProviderRegistry;
pub use resolver::DownloadResolver;
pub use store::{KvStore, ReplicatedStore};
pub use subscription::{check_subscription, SubscriptionStatus};
pub use uploader::{
    normalize_endpoint, ProviderClient, ProviderError, UploadRequest, CAPACITY_REJECTION_MARKER,
};
