//! # Mock Chain
//!
//! In-memory chain for tests. Implements [`ChainQuery`] and
//! [`TxBroadcaster`] without any network access.
//!
//! ## Behavior
//!
//! - Queries answer from state configured through the `set_*` / `add_*`
//!   helpers.
//! - `broadcast_commit` pops scripted results in FIFO order. With no script
//!   left it commits successfully, assigning the current height as the
//!   deal's start block plus any configured pre-assigned providers.
//! - Every broadcast records peak concurrency, so tests can assert that
//!   submissions never overlap.
//!
//! ## Thread Safety
//!
//! All state sits behind `parking_lot` locks or atomics; no lock is held
//! across an await point.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use pinset_common::ContentRoot;

use crate::client::{ChainError, ChainQuery, TxBroadcaster};
use crate::msg::ChainMsg;
use crate::response::encode_post_file_result;
use crate::types::{
    ChainParams, PageRequest, ProviderPage, ProviderRecord, StoragePaymentInfo, TxResult,
};

/// Default account used by [`MockChain::new`].
pub const MOCK_ACCOUNT: &str = "jkl1mockaccount0x9pw3ylhl5ehdy3d6e4xvq6";

// ════════════════════════════════════════════════════════════════════════════
// MOCK CHAIN
// ════════════════════════════════════════════════════════════════════════════

/// Scriptable in-memory chain.
pub struct MockChain {
    account: String,
    params: RwLock<ChainParams>,
    height: AtomicI64,
    providers: RwLock<Vec<ProviderRecord>>,
    hosting: RwLock<HashMap<ContentRoot, Vec<String>>>,
    payments: RwLock<HashMap<String, StoragePaymentInfo>>,
    assigned: RwLock<Vec<String>>,
    scripted: Mutex<VecDeque<Result<TxResult, ChainError>>>,
    submitted: Mutex<Vec<ChainMsg>>,
    broadcast_delay: RwLock<Duration>,
    fail_queries: AtomicBool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    find_calls: AtomicUsize,
}

impl std::fmt::Debug for MockChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChain")
            .field("account", &self.account)
            .field("height", &self.height.load(Ordering::SeqCst))
            .field("providers", &self.providers.read().len())
            .field("submitted", &self.submitted.lock().len())
            .finish()
    }
}

impl MockChain {
    /// Creates a mock chain at height 100 with 1 KiB chunks and no providers.
    pub fn new() -> Self {
        Self::with_account(MOCK_ACCOUNT)
    }

    /// Creates a mock chain whose broadcaster signs as `account`.
    pub fn with_account(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            params: RwLock::new(ChainParams {
                chunk_size: 1024,
                proof_window: 40,
            }),
            height: AtomicI64::new(100),
            providers: RwLock::new(Vec::new()),
            hosting: RwLock::new(HashMap::new()),
            payments: RwLock::new(HashMap::new()),
            assigned: RwLock::new(Vec::new()),
            scripted: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
            broadcast_delay: RwLock::new(Duration::ZERO),
            fail_queries: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
        }
    }

    // ── Setup helpers ──────────────────────────────────────────────────────

    /// Replaces the storage parameters.
    pub fn set_params(&self, params: ChainParams) {
        *self.params.write() = params;
    }

    /// Sets the latest block height.
    pub fn set_height(&self, height: i64) {
        self.height.store(height, Ordering::SeqCst);
    }

    /// Appends a provider to the directory.
    pub fn add_provider(&self, address: impl Into<String>, ip: impl Into<String>) {
        self.providers.write().push(ProviderRecord {
            address: address.into(),
            ip: ip.into(),
            total_space: 1 << 40,
        });
    }

    /// Records which endpoints host `root`, in the order `find_file` returns them.
    pub fn set_hosting(&self, root: ContentRoot, ips: Vec<String>) {
        self.hosting.write().insert(root, ips);
    }

    /// Sets the storage subscription of `account`.
    pub fn set_payment_info(&self, account: impl Into<String>, info: StoragePaymentInfo) {
        self.payments.write().insert(account.into(), info);
    }

    /// Providers the chain pre-assigns to every new deal.
    pub fn set_assigned_providers(&self, ips: Vec<String>) {
        *self.assigned.write() = ips;
    }

    /// Queues a broadcast outcome. Consumed FIFO before default behavior.
    pub fn push_tx_result(&self, result: Result<TxResult, ChainError>) {
        self.scripted.lock().push_back(result);
    }

    /// Makes every broadcast take `delay` before committing.
    pub fn set_broadcast_delay(&self, delay: Duration) {
        *self.broadcast_delay.write() = delay;
    }

    /// Makes every query fail with a transport error.
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    /// Messages broadcast so far, in commit order.
    pub fn submitted(&self) -> Vec<ChainMsg> {
        self.submitted.lock().clone()
    }

    /// Highest number of broadcasts observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of `find_file` queries served.
    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    fn check_queries(&self) -> Result<(), ChainError> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ChainError::Transport("mock query failure".to_string()));
        }
        Ok(())
    }

    fn default_result(&self, msg: &ChainMsg) -> TxResult {
        let start = self.height.fetch_add(1, Ordering::SeqCst);
        let assigned = self.assigned.read().clone();
        TxResult {
            code: 0,
            raw_log: String::new(),
            tx_hash: format!("{:064X}", start),
            data: encode_post_file_result(msg.type_url(), start, &assigned),
        }
    }
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// TRAIT IMPLEMENTATIONS
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ChainQuery for MockChain {
    async fn params(&self) -> Result<ChainParams, ChainError> {
        self.check_queries()?;
        Ok(*self.params.read())
    }

    async fn latest_height(&self) -> Result<i64, ChainError> {
        self.check_queries()?;
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn all_providers(&self, page: &PageRequest) -> Result<ProviderPage, ChainError> {
        self.check_queries()?;
        let mut all = self.providers.read().clone();
        if page.reverse {
            all.reverse();
        }
        let total = all.len() as u64;
        let offset = match &page.key {
            Some(key) => {
                let arr: [u8; 8] = key
                    .as_slice()
                    .try_into()
                    .map_err(|_| ChainError::Transport("bad page key".to_string()))?;
                u64::from_be_bytes(arr) as usize
            }
            None => 0,
        };
        let limit = page.limit.max(1) as usize;
        let end = offset.saturating_add(limit).min(all.len());
        let providers = all.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_key = (end < all.len()).then(|| (end as u64).to_be_bytes().to_vec());
        Ok(ProviderPage {
            providers,
            next_key,
            total: if page.count_total { total } else { 0 },
        })
    }

    async fn find_file(&self, root: &ContentRoot) -> Result<Vec<String>, ChainError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.check_queries()?;
        Ok(self.hosting.read().get(root).cloned().unwrap_or_default())
    }

    async fn storage_payment_info(&self, account: &str) -> Result<StoragePaymentInfo, ChainError> {
        self.check_queries()?;
        self.payments
            .read()
            .get(account)
            .copied()
            .ok_or_else(|| ChainError::NotFound(format!("payment info for {}", account)))
    }
}

#[async_trait]
impl TxBroadcaster for MockChain {
    fn account_address(&self) -> String {
        self.account.clone()
    }

    async fn broadcast_commit(&self, msg: &ChainMsg) -> Result<TxResult, ChainError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.broadcast_delay.read();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let scripted = self.scripted.lock().pop_front();
        let result = match scripted {
            Some(r) => r,
            None => Ok(self.default_result(msg)),
        };
        if result.is_ok() {
            self.submitted.lock().push(msg.clone());
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ════════════════════════════════════════════════════════════════════════════
// COMPILE-TIME ASSERTIONS
// ════════════════════════════════════════════════════════════════════════════

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<MockChain>();
    }
    let _ = check;
};
