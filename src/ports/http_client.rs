use async_trait::async_trait;
use hyper::{HeaderMap, Method};
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::Encoding;

/// Failure modes of a single backend call. Stored per response slot; an
/// individual failure never surfaces as an HTTP 5xx unless every backend of
/// an endpoint fails.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BackendError {
    /// The shared per-request deadline expired before the backend answered.
    #[error("backend request timed out")]
    Timeout,

    /// Connection / transport level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with an error status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body could not be decoded with the configured encoding.
    #[error("failed to decode {encoding} response: {message}")]
    Decode { encoding: Encoding, message: String },

    /// The request could not be constructed (bad URL, bad header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for backend client operations
pub type BackendResult<T> = Result<T, BackendError>;

/// One fully materialized outbound request. Headers are forwarded verbatim;
/// the adapter only adds `Accept` (always) and `Content-Type` (when a body
/// is present and none was forwarded).
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: Method,
    pub url: String,
    pub encoding: Encoding,
    pub headers: HeaderMap,
    pub body: Option<bytes::Bytes>,
    /// Deadline shared by every backend of the same inbound request.
    pub deadline: Instant,
}

/// BackendClient defines the port (interface) for making one outbound HTTP
/// request and decoding its body into a dynamic value.
///
/// Returns `Ok(None)` for successful responses with an empty body.
#[async_trait]
pub trait BackendClient: Send + Sync + 'static {
    async fn fetch(&self, request: BackendRequest) -> BackendResult<Option<Value>>;
}
