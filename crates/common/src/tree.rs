//! # Chunk Tree Builder
//!
//! Splits a payload into fixed-size chunks and reduces the chunk hashes into
//! a binary merkle root. The root is the payload's [`ContentRoot`].
//!
//! ## Algorithm
//!
//! ```text
//! leaf_i      = SHA-256(chunk_i)
//! parent      = SHA-256(left ‖ right)
//! odd level   → duplicate the last node
//! single leaf → root = leaf
//! ```
//!
//! Chunks are filled completely before hashing, so the root does not depend
//! on how the underlying reader fragments its reads.
//!
//! ## Pluggability
//!
//! Replication consumes the [`TreeBuilder`] trait, not this implementation.
//! A network with its own tree layout plugs in a different builder.

use std::io::{self, Read};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::root::ContentRoot;

// ════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════

/// Errors that can occur while building a chunk tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// Reading the payload failed.
    #[error("failed to read payload: {0}")]
    Io(#[from] io::Error),

    /// Chunk size of zero or one that does not fit in memory.
    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    /// Payload contained no bytes.
    #[error("cannot build a tree over an empty payload")]
    EmptyPayload,
}

// ════════════════════════════════════════════════════════════════════════════
// TREE SUMMARY
// ════════════════════════════════════════════════════════════════════════════

/// Result of building a chunk tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeSummary {
    /// Merkle root over all chunks.
    pub root: ContentRoot,
    /// Chunk size used to split the payload.
    pub chunk_size: u64,
    /// Number of chunks (leaves).
    pub chunk_count: u64,
    /// Total payload size in bytes.
    pub size: u64,
}

/// Computes a content identity for a payload.
pub trait TreeBuilder: Send + Sync {
    /// Reads the payload to completion and returns its tree summary.
    fn build_tree(&self, reader: &mut dyn Read, chunk_size: u64) -> Result<TreeSummary, TreeError>;
}

// ════════════════════════════════════════════════════════════════════════════
// DEFAULT BUILDER
// ════════════════════════════════════════════════════════════════════════════

/// SHA-256 binary merkle tree over fixed-size chunks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkTreeBuilder;

impl TreeBuilder for ChunkTreeBuilder {
    fn build_tree(&self, reader: &mut dyn Read, chunk_size: u64) -> Result<TreeSummary, TreeError> {
        let chunk_len = usize::try_from(chunk_size)
            .ok()
            .filter(|n| *n > 0)
            .ok_or(TreeError::InvalidChunkSize(chunk_size))?;

        let mut leaves: Vec<[u8; 32]> = Vec::new();
        let mut size: u64 = 0;
        let mut buf = vec![0u8; chunk_len];

        loop {
            let n = read_chunk(reader, &mut buf)?;
            if n == 0 {
                break;
            }
            leaves.push(Sha256::digest(&buf[..n]).into());
            size = size.saturating_add(n as u64);
            if n < chunk_len {
                break;
            }
        }

        if leaves.is_empty() {
            return Err(TreeError::EmptyPayload);
        }

        let chunk_count = leaves.len() as u64;
        Ok(TreeSummary {
            root: ContentRoot::new(reduce(leaves)),
            chunk_size,
            chunk_count,
            size,
        })
    }
}

/// Fills `buf` until it is full or the reader is exhausted.
fn read_chunk(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn reduce(mut level: Vec<[u8; 32]>) -> [u8; 32] {
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            })
            .collect();
    }
    level[0]
}
