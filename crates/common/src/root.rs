//! Content roots.
//!
//! A [`ContentRoot`] is the 32-byte merkle root of a payload's chunk tree.
//! The same value keys the storage deal on chain and the object on every
//! provider, so its hex rendering is part of the wire format.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Length of a content root in bytes.
pub const ROOT_LEN: usize = 32;

/// Errors from parsing a content root.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RootParseError {
    /// Input is not valid hex.
    #[error("content root is not valid hex: {0}")]
    InvalidHex(String),

    /// Input decoded to the wrong number of bytes.
    #[error("content root must be {expected} bytes, got {actual}")]
    InvalidLength {
        /// Required length.
        expected: usize,
        /// Decoded length.
        actual: usize,
    },
}

/// Merkle root identifying a payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentRoot([u8; ROOT_LEN]);

impl ContentRoot {
    /// Wraps raw root bytes.
    pub const fn new(bytes: [u8; ROOT_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a root from a byte slice of exactly [`ROOT_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, RootParseError> {
        let arr: [u8; ROOT_LEN] = bytes.try_into().map_err(|_| RootParseError::InvalidLength {
            expected: ROOT_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// Parses a root from lowercase or uppercase hex.
    pub fn from_hex(s: &str) -> Result<Self, RootParseError> {
        let bytes = hex::decode(s.trim()).map_err(|e| RootParseError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Raw root bytes.
    pub fn as_bytes(&self) -> &[u8; ROOT_LEN] {
        &self.0
    }

    /// Lowercase hex form used in URLs and upload forms.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> String {
        let h = self.to_hex();
        h.get(0..12).unwrap_or(&h).to_string()
    }
}

impl fmt::Display for ContentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentRoot({})", self.short())
    }
}

impl FromStr for ContentRoot {
    type Err = RootParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; ROOT_LEN]> for ContentRoot {
    fn from(bytes: [u8; ROOT_LEN]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parse_matches_display() {
        let root = ContentRoot::new([0xAB; ROOT_LEN]);
        let parsed: ContentRoot = root.to_string().parse().expect("parse");
        assert_eq!(parsed, root);
        assert_eq!(root.to_hex().len(), 64);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = ContentRoot::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            RootParseError::InvalidLength {
                expected: ROOT_LEN,
                actual: 2
            }
        );
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(matches!(
            ContentRoot::from_hex("zz"),
            Err(RootParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_short_prefix() {
        let root = ContentRoot::new([0x01; ROOT_LEN]);
        assert_eq!(root.short(), "010101010101");
    }
}
