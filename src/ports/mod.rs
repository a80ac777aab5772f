//! Ports (traits) consumed by the request-time engine; implementations live
//! in [`crate::adapters`].

pub mod http_client;

pub use http_client::{BackendClient, BackendError, BackendRequest, BackendResult};
