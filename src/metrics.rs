//! Lightweight metrics helpers for Plexus.
//!
//! Thin wrappers over the `metrics` crate macros. No concrete exporter is
//! embedded; the application can install any compatible recorder externally.
//!
//! Provided metrics:
//! * `plexus_requests_total` (counter; path, method, status)
//! * `plexus_request_duration_seconds` (histogram; path, method)
//! * `plexus_backend_requests_total` (counter; backend, method, status)
//! * `plexus_backend_request_duration_seconds` (histogram; backend, method)
//!
//! The timer structs leverage `Drop` so durations are recorded even on
//! early returns.
use std::time::Instant;

use metrics::{Unit, counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;

pub const PLEXUS_REQUESTS_TOTAL: &str = "plexus_requests_total";
pub const PLEXUS_REQUEST_DURATION_SECONDS: &str = "plexus_request_duration_seconds";
pub const PLEXUS_BACKEND_REQUESTS_TOTAL: &str = "plexus_backend_requests_total";
pub const PLEXUS_BACKEND_REQUEST_DURATION_SECONDS: &str =
    "plexus_backend_request_duration_seconds";

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Register metric descriptions with the installed recorder. Idempotent.
pub fn describe() {
    DESCRIBED.get_or_init(|| {
        describe_counter!(
            PLEXUS_REQUESTS_TOTAL,
            Unit::Count,
            "Total number of HTTP requests processed by the aggregator."
        );
        describe_histogram!(
            PLEXUS_REQUEST_DURATION_SECONDS,
            Unit::Seconds,
            "Latency of HTTP requests processed by the aggregator."
        );
        describe_counter!(
            PLEXUS_BACKEND_REQUESTS_TOTAL,
            Unit::Count,
            "Total number of HTTP requests fanned out to backend services."
        );
        describe_histogram!(
            PLEXUS_BACKEND_REQUEST_DURATION_SECONDS,
            Unit::Seconds,
            "Latency of HTTP requests fanned out to backend services."
        );
    });
}

/// Record one completed inbound request.
pub fn record_request(path: &str, method: &str, status: u16, duration_secs: f64) {
    counter!(
        PLEXUS_REQUESTS_TOTAL,
        "path" => path.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        PLEXUS_REQUEST_DURATION_SECONDS,
        "path" => path.to_string(),
        "method" => method.to_string()
    )
    .record(duration_secs);
}

/// RAII timer for one outbound backend request.
pub struct BackendRequestTimer {
    backend: String,
    method: String,
    status: u16,
    start: Instant,
    recorded: bool,
}

impl BackendRequestTimer {
    pub fn start(backend: &str, method: &str) -> Self {
        Self {
            backend: backend.to_string(),
            method: method.to_string(),
            status: 0,
            start: Instant::now(),
            recorded: false,
        }
    }

    /// Record the outcome with the observed status (0 when the call never
    /// produced a response).
    pub fn finish(mut self, status: u16) {
        self.status = status;
        self.record();
    }

    fn record(&mut self) {
        if self.recorded {
            return;
        }
        self.recorded = true;
        counter!(
            PLEXUS_BACKEND_REQUESTS_TOTAL,
            "backend" => self.backend.clone(),
            "method" => self.method.clone(),
            "status" => self.status.to_string()
        )
        .increment(1);
        histogram!(
            PLEXUS_BACKEND_REQUEST_DURATION_SECONDS,
            "backend" => self.backend.clone(),
            "method" => self.method.clone()
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}

impl Drop for BackendRequestTimer {
    fn drop(&mut self) {
        self.record();
    }
}
