//! Replication config loader using TOML and serde, with env overrides.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes. `from_env` starts from the defaults and applies `PINSET_*`
//! variables on top.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ════════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ════════════════════════════════════════════════════════════════════════════

/// Network identifier providers must report from `/version`.
pub const DEFAULT_NETWORK_ID: &str = "jackal-1";

/// Number of providers each payload is pushed to.
pub const DEFAULT_REPLICA_TARGET: usize = 3;

/// Proof window (blocks between storage proofs) requested for each deal.
pub const DEFAULT_PROOF_WINDOW: i64 = 40;

/// Deal duration: 100 years of 6-second blocks.
pub const DEFAULT_DURATION_BLOCKS: i64 = (100 * 365 * 24 * 60 * 60) / 6;

/// Provider directory page size.
pub const DEFAULT_PROVIDER_PAGE_LIMIT: u64 = 500;

/// Per-call timeout for uploads and downloads.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Per-call timeout for provider health checks.
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 5_000;

/// Storage subscriptions ending within this window are reported as expiring.
pub const DEFAULT_SUBSCRIPTION_WINDOW_SECS: u64 = 5 * 24 * 60 * 60;

// ════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid TOML for [`ReplicationConfig`].
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value that cannot be used.
    #[error("invalid value for {field}: '{value}'")]
    Invalid {
        /// Field or environment variable name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

// ════════════════════════════════════════════════════════════════════════════
// CONFIG
// ════════════════════════════════════════════════════════════════════════════

/// Tunables for deal submission and provider replication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Network identifier a provider's `/version` must report.
    pub network_id: String,
    /// Desired number of accepted replicas.
    pub replica_target: usize,
    /// Proof window requested in the deal.
    pub proof_window: i64,
    /// Proof type requested in the deal.
    pub proof_type: i64,
    /// Deal length in blocks, added to the current height.
    pub duration_blocks: i64,
    /// Free-form note embedded in the deal memo.
    pub memo_note: String,
    /// Page size when listing the provider directory.
    pub provider_page_limit: u64,
    /// Timeout for a single upload or download call.
    pub request_timeout_ms: u64,
    /// Timeout for a single health check.
    pub health_timeout_ms: u64,
    /// Window for reporting a storage subscription as expiring.
    pub subscription_window_secs: u64,
    /// Fixed seed for the provider shuffle. `None` seeds from entropy.
    pub shuffle_seed: Option<u64>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            network_id: DEFAULT_NETWORK_ID.to_string(),
            replica_target: DEFAULT_REPLICA_TARGET,
            proof_window: DEFAULT_PROOF_WINDOW,
            proof_type: 0,
            duration_blocks: DEFAULT_DURATION_BLOCKS,
            memo_note: "pinset data availability blob".to_string(),
            provider_page_limit: DEFAULT_PROVIDER_PAGE_LIMIT,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            health_timeout_ms: DEFAULT_HEALTH_TIMEOUT_MS,
            subscription_window_secs: DEFAULT_SUBSCRIPTION_WINDOW_SECS,
            shuffle_seed: None,
        }
    }
}

impl ReplicationConfig {
    /// Defaults overridden by `PINSET_*` environment variables.
    ///
    /// Recognized variables: `PINSET_NETWORK_ID`, `PINSET_REPLICA_TARGET`,
    /// `PINSET_PROOF_WINDOW`, `PINSET_DURATION_BLOCKS`, `PINSET_MEMO_NOTE`,
    /// `PINSET_REQUEST_TIMEOUT_MS`, `PINSET_HEALTH_TIMEOUT_MS`,
    /// `PINSET_SHUFFLE_SEED`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Applies overrides from an arbitrary variable lookup, then validates.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PINSET_NETWORK_ID") {
            self.network_id = v;
        }
        if let Some(v) = lookup("PINSET_MEMO_NOTE") {
            self.memo_note = v;
        }
        if let Some(v) = lookup("PINSET_REPLICA_TARGET") {
            self.replica_target = parse_var("PINSET_REPLICA_TARGET", &v)?;
        }
        if let Some(v) = lookup("PINSET_PROOF_WINDOW") {
            self.proof_window = parse_var("PINSET_PROOF_WINDOW", &v)?;
        }
        if let Some(v) = lookup("PINSET_DURATION_BLOCKS") {
            self.duration_blocks = parse_var("PINSET_DURATION_BLOCKS", &v)?;
        }
        if let Some(v) = lookup("PINSET_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_var("PINSET_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("PINSET_HEALTH_TIMEOUT_MS") {
            self.health_timeout_ms = parse_var("PINSET_HEALTH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("PINSET_SHUFFLE_SEED") {
            self.shuffle_seed = Some(parse_var("PINSET_SHUFFLE_SEED", &v)?);
        }
        self.validate()
    }

    /// Rejects values replication cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network_id.trim().is_empty() {
            return Err(invalid("network_id", &self.network_id));
        }
        if self.replica_target == 0 {
            return Err(invalid("replica_target", self.replica_target));
        }
        if self.proof_window <= 0 {
            return Err(invalid("proof_window", self.proof_window));
        }
        if self.duration_blocks <= 0 {
            return Err(invalid("duration_blocks", self.duration_blocks));
        }
        if self.provider_page_limit == 0 {
            return Err(invalid("provider_page_limit", self.provider_page_limit));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", self.request_timeout_ms));
        }
        if self.health_timeout_ms == 0 {
            return Err(invalid("health_timeout_ms", self.health_timeout_ms));
        }
        Ok(())
    }
}

/// Load config from a TOML file path and validate it.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<ReplicationConfig, ConfigError> {
    let s = fs::read_to_string(path.as_ref())?;
    let cfg: ReplicationConfig = toml::from_str(&s)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_var<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| invalid(field, value))
}

fn invalid(field: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        field,
        value: value.to_string(),
    }
}
