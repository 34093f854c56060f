//! Failover retrieval by content root.
//!
//! The chain reports which endpoints host a root. They are tried strictly in
//! that order, one at a time, until one returns the payload. The upload
//! blacklist is not consulted: a provider that failed an upload may still
//! serve older content.

use std::sync::Arc;

use bytes::Bytes;
use pinset_chain::{ChainError, ChainQuery};
use pinset_common::ContentRoot;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::RetrievalError;
use crate::uploader::ProviderClient;

/// Fetches payloads from whichever hosting provider answers first.
#[derive(Clone)]
pub struct DownloadResolver {
    chain: Arc<dyn ChainQuery>,
    client: ProviderClient,
}

impl DownloadResolver {
    /// Creates a resolver over `chain` using `client` for downloads.
    pub fn new(chain: Arc<dyn ChainQuery>, client: ProviderClient) -> Self {
        Self { chain, client }
    }

    /// Downloads the payload for `root`.
    pub async fn download(
        &self,
        root: &ContentRoot,
        cancel: &CancellationToken,
    ) -> Result<Bytes, RetrievalError> {
        let endpoints = match cancel.run_until_cancelled(self.chain.find_file(root)).await {
            None => return Err(RetrievalError::Cancelled),
            Some(Err(ChainError::NotFound(_))) => Vec::new(),
            Some(Err(e)) => return Err(RetrievalError::ChainQuery(e)),
            Some(Ok(list)) => list,
        };
        if endpoints.is_empty() {
            return Err(RetrievalError::NotFound(root.to_hex()));
        }
        debug!(root = %root.short(), hosts = endpoints.len(), "resolving download");

        for (attempt, endpoint) in endpoints.iter().enumerate() {
            match cancel
                .run_until_cancelled(self.client.download(endpoint, root))
                .await
            {
                None => return Err(RetrievalError::Cancelled),
                Some(Ok(data)) => {
                    info!(root = %root.short(), provider = %endpoint, attempt, size = data.len(), "download complete");
                    return Ok(data);
                }
                Some(Err(e)) => {
                    warn!(root = %root.short(), provider = %endpoint, attempt, error = %e, "download failed, trying next provider");
                }
            }
        }

        Err(RetrievalError::AllProvidersUnreachable {
            root: *root,
            attempts: endpoints.len(),
        })
    }
}

impl std::fmt::Debug for DownloadResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResolver")
            .field("client", &self.client)
            .finish()
    }
}
