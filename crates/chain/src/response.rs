//! # Transaction Result Decoding
//!
//! A committed deal transaction reports its outcome in `TxResult::data`:
//!
//! ```text
//! hex( TxMsgData { data: [ MsgData { msg_type, data: MsgPostFileResponse } ] } )
//! ```
//!
//! `MsgPostFileResponse` carries the start block the chain assigned to the
//! deal and, on networks that pre-assign storage, the provider endpoints.
//! Uploads embed the start block, so a result that cannot be decoded is
//! fatal for the deal.

use prost::Message;
use thiserror::Error;

use crate::types::TxResult;

// ════════════════════════════════════════════════════════════════════════════
// WIRE MESSAGES
// ════════════════════════════════════════════════════════════════════════════

/// Per-message result data inside a transaction result.
#[derive(Clone, PartialEq, Message)]
pub struct MsgData {
    /// Type URL of the message that produced this entry.
    #[prost(string, tag = "1")]
    pub msg_type: String,
    /// Encoded message response.
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

/// Result data of a whole transaction, one entry per message.
#[derive(Clone, PartialEq, Message)]
pub struct TxMsgData {
    /// Message results in submission order.
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<MsgData>,
}

/// Response of a deal-opening message.
#[derive(Clone, PartialEq, Message)]
pub struct MsgPostFileResponse {
    /// Block at which the deal starts.
    #[prost(int64, tag = "1")]
    pub start_block: i64,
    /// Provider endpoints assigned to the deal, if the chain assigns them.
    #[prost(string, repeated, tag = "2")]
    pub provider_ips: Vec<String>,
}

// ════════════════════════════════════════════════════════════════════════════
// DECODING
// ════════════════════════════════════════════════════════════════════════════

/// Errors from decoding a deal transaction result.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Result data was empty.
    #[error("transaction result carries no data")]
    Empty,

    /// Result data is not hex.
    #[error("transaction data is not hex: {0}")]
    Hex(String),

    /// Protobuf decoding failed.
    #[error("malformed transaction data: {0}")]
    Protobuf(String),

    /// Envelope decoded but holds no message results.
    #[error("no message data in transaction result")]
    NoMessageData,

    /// Start block is negative.
    #[error("invalid start block {0}")]
    InvalidStartBlock(i64),
}

/// Deal parameters assigned by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFileOutcome {
    /// Start block the uploads must embed.
    pub start_block: i64,
    /// Pre-assigned provider endpoints, possibly empty.
    pub provider_ips: Vec<String>,
}

/// Decodes the outcome of a successful deal transaction.
pub fn decode_post_file_result(result: &TxResult) -> Result<PostFileOutcome, DecodeError> {
    if result.data.trim().is_empty() {
        return Err(DecodeError::Empty);
    }
    let raw = hex::decode(result.data.trim()).map_err(|e| DecodeError::Hex(e.to_string()))?;
    let envelope = TxMsgData::decode(raw.as_slice()).map_err(|e| DecodeError::Protobuf(e.to_string()))?;
    let first = envelope.data.first().ok_or(DecodeError::NoMessageData)?;
    let resp = MsgPostFileResponse::decode(first.data.as_slice())
        .map_err(|e| DecodeError::Protobuf(e.to_string()))?;
    if resp.start_block < 0 {
        return Err(DecodeError::InvalidStartBlock(resp.start_block));
    }
    Ok(PostFileOutcome {
        start_block: resp.start_block,
        provider_ips: resp.provider_ips,
    })
}

/// Encodes deal outcome data the way the chain reports it.
pub fn encode_post_file_result(msg_type: &str, start_block: i64, provider_ips: &[String]) -> String {
    let resp = MsgPostFileResponse {
        start_block,
        provider_ips: provider_ips.to_vec(),
    };
    let envelope = TxMsgData {
        data: vec![MsgData {
            msg_type: msg_type.to_string(),
            data: resp.encode_to_vec(),
        }],
    };
    hex::encode(envelope.encode_to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with(data: String) -> TxResult {
        TxResult {
            code: 0,
            raw_log: String::new(),
            tx_hash: "ABCD".to_string(),
            data,
        }
    }

    #[test]
    fn test_decodes_start_block_and_assigned_providers() {
        let ips = vec!["https://p1.example".to_string(), "https://p2.example".to_string()];
        let data = encode_post_file_result("/canine_chain.storage.MsgPostFile", 812, &ips);
        let outcome = decode_post_file_result(&result_with(data)).expect("decode");
        assert_eq!(outcome.start_block, 812);
        assert_eq!(outcome.provider_ips, ips);
    }

    #[test]
    fn test_empty_data_is_fatal() {
        assert_eq!(decode_post_file_result(&result_with(String::new())), Err(DecodeError::Empty));
    }

    #[test]
    fn test_non_hex_is_fatal() {
        assert!(matches!(
            decode_post_file_result(&result_with("not-hex".to_string())),
            Err(DecodeError::Hex(_))
        ));
    }

    #[test]
    fn test_envelope_without_messages_is_fatal() {
        // An empty envelope encodes to zero bytes, so carry one unknown
        // field (tag 2, varint 1) to get past the empty-data check.
        assert!(TxMsgData { data: vec![] }.encode_to_vec().is_empty());
        let data = hex::encode([0x10, 0x01]);
        assert_eq!(
            decode_post_file_result(&result_with(data)),
            Err(DecodeError::NoMessageData)
        );
    }

    #[test]
    fn test_garbage_protobuf_is_fatal() {
        let data = hex::encode([0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(
            decode_post_file_result(&result_with(data)),
            Err(DecodeError::Protobuf(_))
        ));
    }
}
