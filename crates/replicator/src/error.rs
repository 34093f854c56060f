//! Error types for replication, retrieval, and the key-value adapter.
//!
//! Provider-level failures never appear here directly: the coordinator and
//! resolver absorb them and move to the next candidate. Only exhaustion,
//! chain failures, and cancellation propagate.

use pinset_chain::{ChainError, DecodeError, MsgError};
use pinset_common::{ConfigError, ContentRoot, TreeError};
use thiserror::Error;

use crate::queue::QueueError;
use crate::uploader::ProviderError;

/// Errors from [`crate::ReplicationCoordinator::post_file`].
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A chain query failed.
    #[error("chain query failed: {0}")]
    ChainQuery(ChainError),

    /// Chunking or hashing the payload failed.
    #[error("failed to build content tree: {0}")]
    TreeBuild(#[from] TreeError),

    /// The deal message failed local validation and was never sent.
    #[error("invalid deal message: {0}")]
    Validation(#[from] MsgError),

    /// The queue or the broadcaster failed to submit the deal.
    #[error("failed to submit deal: {0}")]
    ChainSubmission(#[from] QueueError),

    /// The deal was committed with a non-zero result code.
    #[error("deal rejected by chain (code {code}): {raw_log}")]
    ChainRejected {
        /// On-chain result code.
        code: u32,
        /// Raw log explaining the rejection.
        raw_log: String,
    },

    /// The deal response payload was empty or malformed.
    #[error("failed to decode deal response: {0}")]
    ResponseDecode(#[from] DecodeError),

    /// No candidate accepted the payload.
    #[error("no provider accepted {root} after {attempted} attempts")]
    NoProviderAccepted {
        /// Content root of the payload.
        root: ContentRoot,
        /// Number of upload attempts made.
        attempted: usize,
    },

    /// Replication settings are unusable.
    #[error("invalid replication config: {0}")]
    Config(#[from] ConfigError),

    /// The provider HTTP client could not be built.
    #[error("provider client setup failed: {0}")]
    Client(ProviderError),

    /// The operation was cancelled by its caller.
    #[error("replication cancelled")]
    Cancelled,
}

/// Errors from [`crate::DownloadResolver::download`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// No provider is known to host the content.
    #[error("no known source for {0}")]
    NotFound(String),

    /// The hosting lookup failed.
    #[error("chain query failed: {0}")]
    ChainQuery(ChainError),

    /// Every hosting provider failed.
    #[error("all {attempts} providers for {root} were unreachable")]
    AllProvidersUnreachable {
        /// Content root being fetched.
        root: ContentRoot,
        /// Number of providers tried.
        attempts: usize,
    },

    /// The operation was cancelled by its caller.
    #[error("retrieval cancelled")]
    Cancelled,
}

/// Errors from [`crate::KvStore`] operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the key.
    #[error("no record for key {0}")]
    NotFound(String),

    /// Storing the payload failed.
    #[error(transparent)]
    Replication(#[from] ReplicationError),

    /// Fetching the payload failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

impl StoreError {
    /// Whether the key or its content could not be located.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound(_) | StoreError::Retrieval(RetrievalError::NotFound(_))
        )
    }
}
