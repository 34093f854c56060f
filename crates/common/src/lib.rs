//! # Pinset Common Crate
//!
//! Types shared by the chain and replication crates.
//!
//! ## Modules
//! - `root`: `ContentRoot`, the payload identity used on chain and by providers
//! - `tree`: `TreeBuilder` trait and the default SHA-256 chunk tree
//! - `config`: `ReplicationConfig` (TOML file + env overrides)

pub mod config;
pub mod root;
pub mod tree;

pub use config::{ConfigError, ReplicationConfig};
pub use root::{ContentRoot, RootParseError, ROOT_LEN};
pub use tree::{ChunkTreeBuilder, TreeBuilder, TreeError, TreeSummary};
