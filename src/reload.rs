//! Hot reload of the request-handling plane.
//!
//! The active [`Server`] sits behind a readers-writer guard. Request
//! dispatch takes a read guard for the duration of one request, so requests
//! already routed keep running on the plane they started on; a reload builds
//! the replacement plane outside the lock and takes the write guard only for
//! the swap.
use std::sync::Arc;

use axum::{Router, extract::Request};
use eyre::{Context, Result};
use tokio::sync::RwLock;
use tower::ServiceExt;

use crate::{config, logging::LoggingHandle, ports::BackendClient, server::Server};

/// Owns the active plane and swaps it on reload.
pub struct ReloadableGateway {
    plane: Arc<RwLock<Arc<Server>>>,
    client: Arc<dyn BackendClient>,
    logging: Option<LoggingHandle>,
    config_path: String,
}

impl ReloadableGateway {
    pub fn new(
        initial: Server,
        client: Arc<dyn BackendClient>,
        logging: Option<LoggingHandle>,
        config_path: impl Into<String>,
    ) -> Self {
        Self {
            plane: Arc::new(RwLock::new(Arc::new(initial))),
            client,
            logging,
            config_path: config_path.into(),
        }
    }

    /// Snapshot of the currently active plane.
    pub async fn current(&self) -> Arc<Server> {
        self.plane.read().await.clone()
    }

    /// The externally served router. Its fallback pins the active plane for
    /// each request and drives the plane's own router to completion.
    pub fn router(&self) -> Router {
        let plane = self.plane.clone();
        Router::new().fallback(move |request: Request| {
            let plane = plane.clone();
            async move {
                let guard = plane.read_owned().await;
                let router = guard.router().clone();
                let response = match router.oneshot(request).await {
                    Ok(response) => response,
                    Err(infallible) => match infallible {},
                };
                drop(guard);
                response
            }
        })
    }

    /// Load the config file, reapply logger configuration, build the new
    /// plane, and swap it in. Any failure leaves the previous plane active.
    pub async fn reload(&self) -> Result<()> {
        tracing::info!("Reloading configuration...");

        let new_config = config::load_config(&self.config_path).with_context(|| {
            format!("Failed to reload configuration from {}", self.config_path)
        })?;

        if let Some(logging) = &self.logging {
            logging.reconfigure(&new_config.log_level, new_config.log_format)?;
        }

        // Plane construction runs outside the lock; the write guard is held
        // only for the pointer swap.
        let new_server = Server::new(Arc::new(new_config), self.client.clone())?;

        *self.plane.write().await = Arc::new(new_server);

        tracing::info!("Configuration reloaded successfully");
        Ok(())
    }
}
