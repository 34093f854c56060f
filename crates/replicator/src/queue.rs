//! # Transaction Queue
//!
//! Serializes every chain-mutating message through one worker task.
//!
//! ## Why one worker
//!
//! An account's transactions carry a sequence number. Two broadcasts in
//! flight at once race for the same number and one of them fails. The queue
//! guarantees that at most one message is being signed, broadcast, or
//! awaited at any instant.
//!
//! ## Flow
//!
//! ```text
//! post(msg) ──► mpsc ──► worker: broadcast_commit(msg) ──► oneshot ──► caller
//!   (N tasks)            (one at a time, FIFO)
//! ```
//!
//! ## Lifecycle
//!
//! - `listen()` spawns the worker. It must be called exactly once.
//! - `post()` before `listen()` fails with [`QueueError::NotListening`].
//! - `shutdown()` closes intake; queued items still complete.
//!
//! A failing message reports its error to its own caller only. The worker
//! keeps going.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pinset_chain::{ChainError, ChainMsg, TxBroadcaster, TxResult};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════

/// Errors returned to a submitter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// `post` was called before `listen`.
    #[error("transaction queue is not listening")]
    NotListening,

    /// `listen` was called twice.
    #[error("transaction queue is already listening")]
    AlreadyListening,

    /// The queue has been shut down.
    #[error("transaction queue is closed")]
    Closed,

    /// The worker dropped the item without answering.
    #[error("transaction queue worker stopped before answering")]
    WorkerGone,

    /// Signing or broadcasting failed.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// A pending submission: consumed once by the worker, answered once.
struct QueueItem {
    message: ChainMsg,
    reply: oneshot::Sender<Result<TxResult, QueueError>>,
}

// ════════════════════════════════════════════════════════════════════════════
// QUEUE
// ════════════════════════════════════════════════════════════════════════════

/// Single-worker FIFO for chain-mutating messages.
pub struct TransactionQueue {
    broadcaster: Arc<dyn TxBroadcaster>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueueItem>>>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueueItem>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    listening: AtomicBool,
}

impl TransactionQueue {
    /// Creates a queue over `broadcaster`. Call [`listen`](Self::listen) before posting.
    pub fn new(broadcaster: Arc<dyn TxBroadcaster>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            broadcaster,
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            worker: Mutex::new(None),
            listening: AtomicBool::new(false),
        }
    }

    /// Address of the account every queued message is signed by.
    pub fn account_address(&self) -> String {
        self.broadcaster.account_address()
    }

    /// Spawns the worker task. Must run inside a Tokio runtime.
    pub fn listen(&self) -> Result<(), QueueError> {
        let mut rx = self
            .receiver
            .lock()
            .take()
            .ok_or(QueueError::AlreadyListening)?;
        let broadcaster = Arc::clone(&self.broadcaster);

        let handle = tokio::spawn(async move {
            info!("transaction queue worker started");
            while let Some(item) = rx.recv().await {
                let kind = item.message.type_url();
                debug!(msg_type = kind, "broadcasting queued message");
                let result = broadcaster
                    .broadcast_commit(&item.message)
                    .await
                    .map_err(QueueError::from);
                if let Err(e) = &result {
                    warn!(msg_type = kind, error = %e, "queued message failed");
                }
                // Submitter may have given up waiting.
                let _ = item.reply.send(result);
            }
            info!("transaction queue worker stopped");
        });

        *self.worker.lock() = Some(handle);
        self.listening.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Queues `message` and waits for its committed result.
    pub async fn post(&self, message: ChainMsg) -> Result<TxResult, QueueError> {
        if !self.listening.load(Ordering::SeqCst) {
            return Err(QueueError::NotListening);
        }
        let sender = self.sender.lock().clone().ok_or(QueueError::Closed)?;

        let (reply, answer) = oneshot::channel();
        sender
            .send(QueueItem { message, reply })
            .map_err(|_| QueueError::Closed)?;

        answer.await.map_err(|_| QueueError::WorkerGone)?
    }

    /// Stops accepting new messages and waits for queued ones to finish.
    pub async fn shutdown(&self) {
        drop(self.sender.lock().take());
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "transaction queue worker ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for TransactionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionQueue")
            .field("listening", &self.listening.load(Ordering::SeqCst))
            .field("closed", &self.sender.lock().is_none())
            .finish()
    }
}
