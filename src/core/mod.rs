//! Request-time engine: response transformation and merging.

pub mod merger;
pub mod transformer;

use serde_json::Value;

use crate::{config::Backend, ports::BackendError};

pub use merger::Merger;
pub use transformer::Transformer;

/// Outcome of one backend call, stored at the backend's configured index.
#[derive(Debug)]
pub struct BackendResponse {
    /// The backend configuration that produced this response, carried along
    /// for its transformation and composition directives.
    pub backend: Backend,
    /// Decoded body; `None` for empty bodies and failures.
    pub data: Option<Value>,
    /// The failure, if the call did not complete successfully.
    pub error: Option<BackendError>,
}
