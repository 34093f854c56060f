//! # Provider Protocol Client
//!
//! HTTP client for the three provider endpoints:
//!
//! ```text
//! GET  {base}/version              → {"chain-id": "<network>", ...}
//! POST {base}/upload   (multipart) → 200 {"cid": "..."} | non-200 {"error": "..."}
//! GET  {base}/download/{hex-root}  → 200 raw bytes
//! ```
//!
//! ## Outcome Classification
//!
//! The client reports what happened; it does not decide policy. The
//! coordinator maps errors to skip / blacklist:
//!
//! - health-check failures of any kind → skip, no penalty
//! - [`ProviderError::is_capacity_rejection`] → skip, no penalty
//! - any other upload error → penalize
//!
//! ## Timeouts
//!
//! The underlying `reqwest::Client` carries the request timeout; health
//! checks use a shorter per-request timeout. No call can hang forever.

use std::time::Duration;

use bytes::Bytes;
use pinset_common::{ContentRoot, ReplicationConfig};
use reqwest::{multipart, Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Providers answer with this message when they are not eligible to prove
/// the deal. Matching on the message text is a compatibility rule: the
/// upload protocol has no structured error code.
pub const CAPACITY_REJECTION_MARKER: &str = "cannot accept file that I cannot claim";

/// JSON field in `/version` naming the provider's network.
pub const NETWORK_ID_FIELD: &str = "chain-id";

// ════════════════════════════════════════════════════════════════════════════
// ERRORS
// ════════════════════════════════════════════════════════════════════════════

/// Errors from a single provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider base URL is not an absolute http(s) URL. Never sent.
    #[error("invalid provider endpoint '{0}'")]
    InvalidEndpoint(String),

    /// Network failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded its timeout.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// Response did not have the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Provider serves a different network.
    #[error("provider reports network {found:?}, expected '{expected}'")]
    NetworkMismatch {
        /// Network the client expects.
        expected: String,
        /// Network the provider reported, if any.
        found: Option<String>,
    },

    /// Provider refused the upload with a structured error body.
    #[error("upload failed with code {status} | {message}")]
    UploadRejected {
        /// HTTP status code.
        status: u16,
        /// Provider's error message.
        message: String,
    },

    /// Non-200 response to a download.
    #[error("unexpected status {0}")]
    BadStatus(u16),
}

impl ProviderError {
    /// Whether this is the provider's benign "not eligible for this deal" answer.
    pub fn is_capacity_rejection(&self) -> bool {
        matches!(self, ProviderError::UploadRejected { message, .. }
            if message.contains(CAPACITY_REJECTION_MARKER))
    }

    fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout(url.to_string())
        } else if e.is_decode() {
            ProviderError::Protocol(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// WIRE TYPES
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct UploadResponse {
    cid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Everything a provider needs to accept a payload for a deal.
#[derive(Debug, Clone)]
pub struct UploadRequest<'a> {
    /// Deal owner.
    pub sender: &'a str,
    /// Content root of the payload.
    pub root: &'a ContentRoot,
    /// Start block assigned to the deal.
    pub start_block: i64,
    /// Payload bytes.
    pub payload: Bytes,
}

// ════════════════════════════════════════════════════════════════════════════
// CLIENT
// ════════════════════════════════════════════════════════════════════════════

/// Client for provider health, upload, and download endpoints.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: Client,
    network_id: String,
    health_timeout: Duration,
}

impl ProviderClient {
    /// Builds a client from replication settings.
    pub fn new(config: &ReplicationConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            network_id: config.network_id.clone(),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        })
    }

    /// Network this client expects providers to serve.
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Checks that `base` answers `/version` with the expected network.
    pub async fn health_check(&self, base: &str) -> Result<(), ProviderError> {
        let url = endpoint(base, "version")?;
        let resp = self
            .client
            .get(url.clone())
            .timeout(self.health_timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(url.as_str(), e))?;
        let body = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(url.as_str(), e))?;

        let json: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Protocol(format!("response body is not valid JSON: {}", e)))?;
        let found = json
            .get(NETWORK_ID_FIELD)
            .and_then(|v| v.as_str())
            .map(str::to_string);

        if found.as_deref() != Some(self.network_id.as_str()) {
            return Err(ProviderError::NetworkMismatch {
                expected: self.network_id.clone(),
                found,
            });
        }
        Ok(())
    }

    /// Uploads the payload for a deal and returns the provider's object id.
    pub async fn upload(&self, base: &str, req: &UploadRequest<'_>) -> Result<String, ProviderError> {
        let url = endpoint(base, "upload")?;
        let root_hex = req.root.to_hex();
        let len = req.payload.len() as u64;

        let file = multipart::Part::stream_with_length(reqwest::Body::from(req.payload.clone()), len)
            .file_name(root_hex.clone());
        let form = multipart::Form::new()
            .text("sender", req.sender.to_string())
            .text("merkle", root_hex)
            .text("start", req.start_block.to_string())
            .part("file", file);

        debug!(url = %url, root = %req.root.short(), size = len, "uploading payload");
        let resp = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(url.as_str(), e))?;

        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(url.as_str(), e))?;

        if status != StatusCode::OK {
            let err: ErrorResponse = serde_json::from_slice(&body).map_err(|_| {
                ProviderError::Protocol(format!(
                    "upload failed with code {} and an unstructured body",
                    status.as_u16()
                ))
            })?;
            return Err(ProviderError::UploadRejected {
                status: status.as_u16(),
                message: err.error,
            });
        }

        let ok: UploadResponse = serde_json::from_slice(&body)
            .map_err(|e| ProviderError::Protocol(format!("invalid upload response: {}", e)))?;
        Ok(ok.cid)
    }

    /// Downloads the payload stored under `root`.
    pub async fn download(&self, base: &str, root: &ContentRoot) -> Result<Bytes, ProviderError> {
        let url = endpoint(base, &format!("download/{}", root.to_hex()))?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(url.as_str(), e))?;

        if resp.status() != StatusCode::OK {
            return Err(ProviderError::BadStatus(resp.status().as_u16()));
        }
        resp.bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(url.as_str(), e))
    }
}

/// Joins `path` onto a provider base URL, tolerating a trailing slash.
pub fn endpoint(base: &str, path: &str) -> Result<Url, ProviderError> {
    let trimmed = base.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed).map_err(|_| ProviderError::InvalidEndpoint(base.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ProviderError::InvalidEndpoint(base.to_string()));
    }
    Url::parse(&format!("{}/{}", trimmed, path))
        .map_err(|_| ProviderError::InvalidEndpoint(base.to_string()))
}

/// Canonical form of a provider base URL, used to match endpoints.
pub fn normalize_endpoint(base: &str) -> String {
    base.trim().trim_end_matches('/').to_ascii_lowercase()
}
