//! Adapter implementations of the [`crate::ports`] traits.

pub mod http_client;

pub use http_client::HttpBackendClient;
