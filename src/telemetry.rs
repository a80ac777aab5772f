//! Telemetry collaborator seam.
//!
//! The exporter SDK itself is external to this crate: metrics are emitted
//! through the `metrics` facade (any compatible recorder can be installed by
//! the embedding process) and spans through `tracing`. This module owns the
//! configuration flags and performs the one-time registration work.
use crate::{config::Config, metrics};

/// Snapshot of the telemetry configuration in effect.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub service_name: String,
    pub tracing_enabled: bool,
    pub metrics_enabled: bool,
}

/// Initialize telemetry from config: register metric descriptions when
/// metrics are enabled and surface the exporter endpoint when tracing is.
pub fn init(config: &Config) -> Telemetry {
    if config.metrics_enabled {
        metrics::describe();
        tracing::info!(service_name = %config.service_name, "Metrics registration complete");
    }

    if config.tracing_enabled {
        tracing::info!(
            service_name = %config.service_name,
            endpoint = %config.tracing_endpoint,
            "Tracing export enabled; spans are collected by the external exporter"
        );
    }

    Telemetry {
        service_name: config.service_name.clone(),
        tracing_enabled: config.tracing_enabled,
        metrics_enabled: config.metrics_enabled,
    }
}
