//! # Replication Coordinator
//!
//! Turns a payload into a committed storage deal plus up to
//! `replica_target` accepted provider copies.
//!
//! ## Pipeline
//!
//! ```text
//! params ──► content tree ──► height + duration ──► MsgPostFile
//!                                                      │
//!                              TransactionQueue::post ◄┘
//!                                      │
//!                     decode {start_block, assigned ips}
//!                                      │
//!               directory ──► plan_candidates ──► concurrent uploads
//! ```
//!
//! ## Upload Policy
//!
//! | Outcome                           | Effect                       |
//! |-----------------------------------|------------------------------|
//! | accepted                          | counts toward the target     |
//! | health check failed               | skipped, no penalty          |
//! | capacity rejection                | skipped, no penalty          |
//! | any other upload failure          | provider blacklisted         |
//!
//! At most `replica_target` attempts are in flight. A new candidate starts
//! only when an attempt ends without an acceptance, and nothing new starts
//! once the target is met. One acceptance is enough for success.
//!
//! ## Cancellation
//!
//! Every await observes the caller's [`CancellationToken`]. Cancelling
//! drops in-flight provider calls. A deal already handed to the queue is
//! still broadcast by the worker.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use pinset_chain::{
    decode_post_file_result, list_all_providers, ChainMsg, ChainQuery, MsgPostFile,
};
use pinset_common::{ContentRoot, ReplicationConfig, TreeBuilder};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::error::ReplicationError;
use crate::placement::{plan_candidates, Provider};
use crate::queue::TransactionQueue;
use crate::registry::ProviderRegistry;
use crate::uploader::{ProviderClient, ProviderError, UploadRequest};

// ════════════════════════════════════════════════════════════════════════════
// RESULT TYPES
// ════════════════════════════════════════════════════════════════════════════

/// A committed storage deal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageDeal {
    /// Content root the deal covers.
    pub root: ContentRoot,
    /// Payload size in bytes.
    pub size: u64,
    /// Replica count requested.
    pub replica_target: usize,
    /// Requested deal length in blocks.
    pub duration_blocks: i64,
    /// Start block assigned by the chain.
    pub start_block: i64,
    /// Block at which the deal expires.
    pub expires_at_block: i64,
}

/// Outcome of a successful [`ReplicationCoordinator::post_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationReceipt {
    /// Object id returned by the first accepting candidate.
    pub cid: String,
    /// Content root of the payload.
    pub root: ContentRoot,
    /// The committed deal.
    pub deal: StorageDeal,
    /// Providers holding a copy, in candidate order.
    pub accepted: Vec<Provider>,
}

impl ReplicationReceipt {
    /// Whether fewer copies than requested were placed.
    pub fn is_partial(&self) -> bool {
        self.accepted.len() < self.deal.replica_target
    }
}

enum AttemptOutcome {
    Accepted(String),
    Skipped(ProviderError),
    Failed(ProviderError),
}

struct Attempt {
    index: usize,
    provider: Provider,
    outcome: AttemptOutcome,
}

// ════════════════════════════════════════════════════════════════════════════
// COORDINATOR
// ════════════════════════════════════════════════════════════════════════════

/// Submits deals and pushes payloads to providers.
pub struct ReplicationCoordinator {
    queue: Arc<TransactionQueue>,
    chain: Arc<dyn ChainQuery>,
    tree: Arc<dyn TreeBuilder>,
    client: ProviderClient,
    registry: Arc<ProviderRegistry>,
    config: ReplicationConfig,
    rng: Mutex<StdRng>,
}

impl ReplicationCoordinator {
    /// Creates a coordinator. The queue must be listening before the first
    /// `post_file`. Rejects settings that fail [`ReplicationConfig::validate`].
    pub fn new(
        queue: Arc<TransactionQueue>,
        chain: Arc<dyn ChainQuery>,
        tree: Arc<dyn TreeBuilder>,
        registry: Arc<ProviderRegistry>,
        config: ReplicationConfig,
    ) -> Result<Self, ReplicationError> {
        config.validate()?;
        let client = ProviderClient::new(&config).map_err(ReplicationError::Client)?;
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            queue,
            chain,
            tree,
            client,
            registry,
            config,
            rng: Mutex::new(rng),
        })
    }

    /// Provider client shared with retrieval.
    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    /// Blacklist consulted before every upload.
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Active settings.
    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Stores `payload` under a new deal and replicates it.
    ///
    /// `key` only feeds the deal memo. Succeeds once at least one provider
    /// accepted the payload.
    pub async fn post_file(
        &self,
        payload: Bytes,
        key: &[u8],
        cancel: &CancellationToken,
    ) -> Result<ReplicationReceipt, ReplicationError> {
        let params = guard(cancel, self.chain.params())
            .await?
            .map_err(ReplicationError::ChainQuery)?;

        let mut reader: &[u8] = payload.as_ref();
        let summary = self.tree.build_tree(&mut reader, params.chunk_size)?;
        let root = summary.root;
        debug!(root = %root.short(), size = summary.size, chunks = summary.chunk_count, "content tree built");

        let height = guard(cancel, self.chain.latest_height())
            .await?
            .map_err(ReplicationError::ChainQuery)?;
        let expires = height.saturating_add(self.config.duration_blocks);

        let sender = self.queue.account_address();
        let mut deal_msg = MsgPostFile::new(
            sender.clone(),
            root,
            i64::try_from(summary.size).unwrap_or(i64::MAX),
            self.config.proof_window,
            self.config.proof_type,
            i64::try_from(self.config.replica_target).unwrap_or(i64::MAX),
            deal_memo(&self.config.memo_note, key),
        );
        deal_msg.expires = expires;
        let msg = ChainMsg::from(deal_msg);
        msg.validate_basic()?;

        let result = guard(cancel, self.queue.post(msg)).await??;
        if !result.is_ok() {
            warn!(root = %root.short(), code = result.code, raw_log = %result.raw_log, "deal rejected");
            return Err(ReplicationError::ChainRejected {
                code: result.code,
                raw_log: result.raw_log,
            });
        }
        let outcome = decode_post_file_result(&result)?;
        info!(
            root = %root.short(),
            start_block = outcome.start_block,
            assigned = outcome.provider_ips.len(),
            tx_hash = %result.tx_hash,
            "deal committed"
        );

        let directory = guard(
            cancel,
            list_all_providers(self.chain.as_ref(), self.config.provider_page_limit),
        )
        .await?
        .map_err(ReplicationError::ChainQuery)?;

        let candidates = {
            let mut rng = self.rng.lock();
            plan_candidates(&outcome.provider_ips, directory, &self.registry, &mut *rng)
        };
        debug!(root = %root.short(), candidates = candidates.len(), "upload candidates planned");

        let request = UploadRequest {
            sender: &sender,
            root: &root,
            start_block: outcome.start_block,
            payload,
        };
        let mut accepted = self.replicate(&request, candidates, cancel).await?;
        accepted.sort_by_key(|(index, _, _)| *index);

        let cid = accepted
            .first()
            .map(|(_, _, cid)| cid.clone())
            .unwrap_or_default();
        let accepted: Vec<Provider> = accepted.into_iter().map(|(_, p, _)| p).collect();
        if accepted.len() < self.config.replica_target {
            warn!(
                root = %root.short(),
                accepted = accepted.len(),
                target = self.config.replica_target,
                "partial replication"
            );
        }

        Ok(ReplicationReceipt {
            cid,
            root,
            deal: StorageDeal {
                root,
                size: summary.size,
                replica_target: self.config.replica_target,
                duration_blocks: self.config.duration_blocks,
                start_block: outcome.start_block,
                expires_at_block: expires,
            },
            accepted,
        })
    }

    /// Runs candidate uploads until the replica target is met or the list
    /// runs out. Returns `(candidate index, provider, cid)` per acceptance.
    async fn replicate(
        &self,
        request: &UploadRequest<'_>,
        candidates: Vec<Provider>,
        cancel: &CancellationToken,
    ) -> Result<Vec<(usize, Provider, String)>, ReplicationError> {
        let target = self.config.replica_target;
        let mut pending = candidates.into_iter().enumerate();
        let mut in_flight = FuturesUnordered::new();
        let mut accepted = Vec::with_capacity(target);
        let mut attempted = 0usize;

        loop {
            while accepted.len() + in_flight.len() < target {
                let Some((index, provider)) = pending.next() else {
                    break;
                };
                // Another call may have penalized it since planning.
                if self.registry.is_blacklisted(&provider.address) {
                    debug!(address = %provider.address, "skipping blacklisted provider");
                    continue;
                }
                attempted += 1;
                in_flight.push(self.attempt(index, provider, request));
            }

            let next = match cancel.run_until_cancelled(in_flight.next()).await {
                None => return Err(ReplicationError::Cancelled),
                Some(None) => break,
                Some(Some(attempt)) => attempt,
            };

            let Attempt {
                index,
                provider,
                outcome,
            } = next;
            match outcome {
                AttemptOutcome::Accepted(cid) => {
                    info!(
                        root = %request.root.short(),
                        provider = %provider.endpoint,
                        address = %provider.address,
                        attempt = index,
                        cid = %cid,
                        "replica accepted"
                    );
                    accepted.push((index, provider, cid));
                }
                AttemptOutcome::Skipped(e) => {
                    warn!(
                        root = %request.root.short(),
                        provider = %provider.endpoint,
                        attempt = index,
                        error = %e,
                        "provider skipped"
                    );
                }
                AttemptOutcome::Failed(e) => {
                    self.registry.mark_blacklisted(&provider.address);
                    warn!(
                        root = %request.root.short(),
                        provider = %provider.endpoint,
                        address = %provider.address,
                        attempt = index,
                        error = %e,
                        "upload failed, provider blacklisted"
                    );
                }
            }
        }

        if accepted.is_empty() {
            return Err(ReplicationError::NoProviderAccepted {
                root: *request.root,
                attempted,
            });
        }
        Ok(accepted)
    }

    async fn attempt(&self, index: usize, provider: Provider, request: &UploadRequest<'_>) -> Attempt {
        debug!(provider = %provider.endpoint, address = %provider.address, attempt = index, "checking provider");

        let outcome = match self.client.health_check(&provider.endpoint).await {
            Err(e) => AttemptOutcome::Skipped(e),
            Ok(()) => {
                let limit = Duration::from_millis(self.config.request_timeout_ms);
                let upload = tokio::time::timeout(limit, self.client.upload(&provider.endpoint, request))
                    .await
                    .unwrap_or_else(|_| Err(ProviderError::Timeout(provider.endpoint.clone())));
                match upload {
                    Ok(cid) => AttemptOutcome::Accepted(cid),
                    Err(e) if e.is_capacity_rejection() => AttemptOutcome::Skipped(e),
                    Err(e) => AttemptOutcome::Failed(e),
                }
            }
        };

        Attempt {
            index,
            provider,
            outcome,
        }
    }
}

impl std::fmt::Debug for ReplicationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicationCoordinator")
            .field("queue", &self.queue)
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish()
    }
}

/// Deal memo: `{"memo": note, "opblock": hex(key)}`.
fn deal_memo(note: &str, key: &[u8]) -> String {
    serde_json::json!({
        "memo": note,
        "opblock": hex::encode(key),
    })
    .to_string()
}

async fn guard<F: std::future::Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, ReplicationError> {
    cancel
        .run_until_cancelled(fut)
        .await
        .ok_or(ReplicationError::Cancelled)
}

// ════════════════════════════════════════════════════════════════════════════
// COMPILE-TIME ASSERTIONS
// ════════════════════════════════════════════════════════════════════════════

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<ReplicationCoordinator>();
    }
    let _ = check;
};
