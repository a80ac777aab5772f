//! The request-handling plane: an axum router built from one config
//! snapshot, plus the middleware stack wrapping it.
//!
//! A [`Server`] is immutable once constructed; reloads build a fresh one and
//! swap it in behind the reload controller's guard.
pub mod aggregation;
pub mod health;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router,
    extract::{RawPathParams, Request},
    routing::{MethodFilter, get, on},
};
use eyre::{Result, WrapErr, eyre};
use hyper::Method;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::{CompressionLayer, predicate::SizeAbove},
};

use crate::{config::Config, ports::BackendClient, server::aggregation::AggregationHandler};

// Responses below this size are not worth compressing.
const COMPRESSION_MIN_SIZE: u16 = 1024;

/// One immutable request-handling plane derived from a config snapshot.
pub struct Server {
    config: Arc<Config>,
    router: Router,
}

impl Server {
    /// Build the plane: one aggregation handler per configured endpoint,
    /// health probes, a JSON 404 fallback, and the middleware stack.
    pub fn new(config: Arc<Config>, client: Arc<dyn BackendClient>) -> Result<Self> {
        let router = build_router(&config, client)?;
        Ok(Self { config, router })
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

fn build_router(config: &Arc<Config>, client: Arc<dyn BackendClient>) -> Result<Router> {
    let mut router = Router::new()
        .route("/livez", get(health::handle_liveness))
        .route("/readyz", get(health::handle_readiness));

    for endpoint in &config.endpoints {
        let method: Method = endpoint
            .method
            .parse()
            .wrap_err_with(|| format!("Invalid method for endpoint {}", endpoint.endpoint))?;
        let filter = MethodFilter::try_from(method)
            .map_err(|e| eyre!("Unroutable method for endpoint {}: {e}", endpoint.endpoint))?;

        let handler = Arc::new(AggregationHandler::new(endpoint.clone(), client.clone()));
        router = router.route(
            &endpoint.endpoint,
            on(filter, move |params: RawPathParams, request: Request| {
                let handler = handler.clone();
                async move { handler.handle(params, request).await }
            }),
        );

        tracing::info!(
            endpoint = %endpoint.endpoint,
            method = %endpoint.method,
            backends = endpoint.backends.len(),
            "Registered endpoint"
        );
    }

    // Outermost first: recovery, compression, request log, tracing.
    let router = router.fallback(health::handle_not_found).layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::custom(middleware::panic_response))
            .layer(axum::middleware::from_fn(middleware::vary_accept_encoding))
            .layer(CompressionLayer::new().compress_when(SizeAbove::new(COMPRESSION_MIN_SIZE)))
            .layer(axum::middleware::from_fn(middleware::log_requests))
            .layer(axum::middleware::from_fn(middleware::trace_requests)),
    );

    Ok(router)
}
