//! # Pinset Chain Crate
//!
//! Everything replication needs from the storage chain, without a concrete
//! RPC client.
//!
//! ## Modules
//! - `types`: query results, pagination, committed transaction results
//! - `msg`: chain-mutating messages and their stateless validation
//! - `response`: protobuf decoding of deal transaction results
//! - `client`: `ChainQuery` / `TxBroadcaster` traits
//! - `mock`: in-memory `MockChain` for tests
//!
//! ## Architecture
//! ```text
//! ┌──────────────┐   ┌───────────────┐
//! │  ChainQuery  │   │ TxBroadcaster │  <- traits consumed by replication
//! └──────┬───────┘   └───────┬───────┘
//!        └─────────┬─────────┘
//!            ┌─────▼─────┐
//!            │ MockChain │  (tests)   / RPC + wallet client (deployment)
//!            └───────────┘
//! ```

pub mod client;
pub mod mock;
pub mod msg;
pub mod response;
pub mod types;

pub use client::{list_all_providers, ChainError, ChainQuery, TxBroadcaster};
pub use mock::MockChain;
pub use msg::{ChainMsg, MsgError, MsgPostFile};
pub use response::{decode_post_file_result, DecodeError, PostFileOutcome};
pub use types::{
    ChainParams, PageRequest, ProviderPage, ProviderRecord, StoragePaymentInfo, TxResult,
};
