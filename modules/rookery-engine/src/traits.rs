use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Which connection timeline to walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineKind {
    Following,
    MutualFollowers,
}

/// Semantic parameters for one page fetch. The engine never constructs
/// platform URLs, headers, cookies, or query strings — the transport
/// translates these into whatever the platform currently expects.
#[derive(Debug, Clone)]
pub struct PageRequest {
    pub entity_id: String,
    pub timeline: TimelineKind,
    pub cursor: Option<String>,
    pub page_size: u32,
    pub include_promoted: bool,
}

/// One raw HTTP response, ready to classify. The transport does not
/// interpret the body; classification is the engine's job.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request could not be built: {0}")]
    Request(String),
}

impl TransportError {
    /// Timeouts and connection drops are retryable; a request that cannot
    /// be built will not improve on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout | TransportError::Connection(_))
    }
}

/// The engine's only view of HTTP. One call, one attempt — retries and
/// backoff live in the engine, not the transport.
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<RawResponse, TransportError>;
}
