//! Query and result types exchanged with the storage chain.

/// Chain-wide storage parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainParams {
    /// Chunk size used to build a payload's tree.
    pub chunk_size: u64,
    /// Default proof window the chain expects, in blocks.
    pub proof_window: i64,
}

/// One entry of the provider directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRecord {
    /// On-chain account address of the provider.
    pub address: String,
    /// Public base URL of the provider's HTTP endpoint.
    pub ip: String,
    /// Advertised capacity in bytes.
    pub total_space: u64,
}

/// Pagination request for directory listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation key from the previous page. `None` starts from the beginning.
    pub key: Option<Vec<u8>>,
    /// Maximum entries per page.
    pub limit: u64,
    /// Ask the chain to report the total count.
    pub count_total: bool,
    /// Iterate in reverse insertion order.
    pub reverse: bool,
}

impl PageRequest {
    /// First page with the given limit, newest entries first.
    pub fn first(limit: u64) -> Self {
        Self {
            key: None,
            limit,
            count_total: true,
            reverse: true,
        }
    }
}

/// A page of the provider directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderPage {
    /// Providers on this page.
    pub providers: Vec<ProviderRecord>,
    /// Key for the next page, `None` on the last page.
    pub next_key: Option<Vec<u8>>,
    /// Total directory size when `count_total` was requested.
    pub total: u64,
}

/// Storage subscription of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoragePaymentInfo {
    /// Subscription start (unix seconds).
    pub start: u64,
    /// Subscription end (unix seconds).
    pub end: u64,
    /// Purchased space in bytes.
    pub space_available: u64,
    /// Space currently committed by deals, in bytes.
    pub space_used: u64,
}

/// Committed transaction result as reported by the chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxResult {
    /// ABCI result code. Zero means success.
    pub code: u32,
    /// Human-readable log, carries the failure reason on non-zero codes.
    pub raw_log: String,
    /// Transaction hash.
    pub tx_hash: String,
    /// Hex-encoded `TxMsgData` protobuf.
    pub data: String,
}

impl TxResult {
    /// Whether the transaction executed successfully.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
