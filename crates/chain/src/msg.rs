//! # Chain Messages
//!
//! Messages that mutate chain state. Every message must pass
//! `validate_basic` before it is handed to the transaction queue; a message
//! that fails is never signed or broadcast.

use pinset_common::ContentRoot;
use thiserror::Error;

/// Bech32 separator between the human-readable prefix and the data part.
const BECH32_SEPARATOR: char = '1';

// ════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════

/// Structural problems detected before submission.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MsgError {
    /// Creator is not a bech32-looking account address.
    #[error("invalid creator address: '{0}'")]
    InvalidCreator(String),

    /// A numeric field is out of range.
    #[error("{field} must be positive, got {value}")]
    NonPositive {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: i64,
    },

    /// Proof type is negative.
    #[error("proof type must not be negative, got {0}")]
    InvalidProofType(i64),
}

// ════════════════════════════════════════════════════════════════════════════
// POST FILE
// ════════════════════════════════════════════════════════════════════════════

/// Opens a storage deal for a content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgPostFile {
    /// Account that owns the deal and pays for it.
    pub creator: String,
    /// Content root of the payload.
    pub merkle: ContentRoot,
    /// Payload size in bytes.
    pub file_size: i64,
    /// Blocks between storage proofs.
    pub proof_interval: i64,
    /// Proof scheme selector.
    pub proof_type: i64,
    /// Number of providers the deal should be proven by.
    pub max_proofs: i64,
    /// Block height at which the deal expires.
    pub expires: i64,
    /// Free-form JSON note.
    pub note: String,
}

impl MsgPostFile {
    /// Builds a deal message. `expires` starts at zero and is set by the caller.
    pub fn new(
        creator: impl Into<String>,
        merkle: ContentRoot,
        file_size: i64,
        proof_interval: i64,
        proof_type: i64,
        max_proofs: i64,
        note: impl Into<String>,
    ) -> Self {
        Self {
            creator: creator.into(),
            merkle,
            file_size,
            proof_interval,
            proof_type,
            max_proofs,
            expires: 0,
            note: note.into(),
        }
    }

    /// Stateless checks the chain would otherwise reject the transaction for.
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        validate_address(&self.creator)?;
        positive("file_size", self.file_size)?;
        positive("proof_interval", self.proof_interval)?;
        positive("max_proofs", self.max_proofs)?;
        positive("expires", self.expires)?;
        if self.proof_type < 0 {
            return Err(MsgError::InvalidProofType(self.proof_type));
        }
        Ok(())
    }
}

/// Any chain-mutating message the queue can carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainMsg {
    /// Open a storage deal.
    PostFile(MsgPostFile),
}

impl ChainMsg {
    /// Type URL used in transaction envelopes and logs.
    pub fn type_url(&self) -> &'static str {
        match self {
            ChainMsg::PostFile(_) => "/canine_chain.storage.MsgPostFile",
        }
    }

    /// Runs the wrapped message's stateless validation.
    pub fn validate_basic(&self) -> Result<(), MsgError> {
        match self {
            ChainMsg::PostFile(m) => m.validate_basic(),
        }
    }
}

impl From<MsgPostFile> for ChainMsg {
    fn from(m: MsgPostFile) -> Self {
        ChainMsg::PostFile(m)
    }
}

fn positive(field: &'static str, value: i64) -> Result<(), MsgError> {
    if value <= 0 {
        return Err(MsgError::NonPositive { field, value });
    }
    Ok(())
}

/// Shape check only: `<hrp>1<data>` with lowercase alphanumerics.
fn validate_address(addr: &str) -> Result<(), MsgError> {
    let invalid = || MsgError::InvalidCreator(addr.to_string());
    let (hrp, data) = addr.rsplit_once(BECH32_SEPARATOR).ok_or_else(invalid)?;
    let well_formed = !hrp.is_empty()
        && data.len() >= 6
        && addr
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !well_formed {
        return Err(invalid());
    }
    Ok(())
}
