//! Plexus - a declarative HTTP API aggregation gateway.
//!
//! Plexus exposes a set of configured public endpoints; each inbound request
//! fans out to the endpoint's backends in parallel, every decoded response
//! runs through its backend's transformation pipeline (`target` →
//! `allow`/`deny` → `mapping`), and the results are merged into a single
//! JSON reply carrying an aggregation-completeness header. This library
//! exposes the building blocks so the engine can be embedded or driven from
//! the provided binary.
//!
//! # Features
//! - Path-parameterized routing (`/users/{id}`) with per-endpoint methods
//! - Concurrent fan-out under a shared per-request deadline, with partial
//!   failure as a supported outcome
//! - Per-backend response transformation and three composition modes
//!   (deep-merge, named group, concatenated array)
//! - JSON / XML / YAML backend body decoding
//! - Hot configuration reload on SIGHUP; in-flight requests are unaffected
//! - Structured tracing, request metrics, gzip response compression
//! - Graceful shutdown bounded by a configurable deadline
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use plexus::{adapters::HttpBackendClient, config, server::Server};
//!
//! # fn main() -> eyre::Result<()> {
//! let cfg = config::load_config("config.yaml")?;
//! let client = Arc::new(HttpBackendClient::new()?);
//! let server = Server::new(Arc::new(cfg), client)?;
//! // Wire server.router() into axum::serve, or wrap it in a
//! // ReloadableGateway for hot reload (see the binary crate).
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters**
//! (implementations) and keeps the request-time engine inside `core` and
//! `server`. End users should prefer the re-exports documented below
//! instead of reaching into internal modules directly.
//!
//! # Error Handling
//! Application-level APIs return `eyre::Result<T>`; the seams (backend
//! client, config validation) carry domain error enums. Backend failures
//! are recovered per-slot and only surface as an HTTP error when every
//! backend of an endpoint fails.

pub mod adapters;
pub mod config;
pub mod core;
pub mod logging;
pub mod metrics;
pub mod ports;
pub mod reload;
pub mod server;
pub mod telemetry;
pub mod utils;

pub use crate::config::{Backend, Config, Encoding, Endpoint};
pub use crate::core::{BackendResponse, Merger, Transformer};
pub use crate::reload::ReloadableGateway;
pub use crate::server::Server;
