//! Per-endpoint aggregation: fan a single inbound request out to every
//! configured backend in parallel, merge the results, reply once.
use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Body,
    extract::{RawPathParams, Request},
    response::Response,
};
use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode, header};
use serde_json::json;
use tokio::time::Instant;

use crate::{
    config::{Backend, Endpoint},
    core::{BackendResponse, Merger},
    ports::{BackendClient, BackendError, BackendRequest},
    server::health::json_response,
};

/// Header reporting whether every backend completed successfully.
pub const AGGREGATION_COMPLETED_HEADER: &str = "x-api-aggregation-completed";

// Inbound headers never forwarded to backends, independent of any
// per-backend remove_headers configuration.
const HOP_BY_HOP_HEADERS: [&str; 6] = [
    "host",
    "content-length",
    "transfer-encoding",
    "connection",
    "upgrade",
    "accept-encoding",
];

/// Handles requests for one configured endpoint. Built once per plane.
pub struct AggregationHandler {
    endpoint: Endpoint,
    client: Arc<dyn BackendClient>,
    merger: Merger,
}

impl AggregationHandler {
    pub fn new(endpoint: Endpoint, client: Arc<dyn BackendClient>) -> Self {
        Self {
            endpoint,
            client,
            merger: Merger::new(),
        }
    }

    pub async fn handle(self: Arc<Self>, params: RawPathParams, request: Request) -> Response {
        // Every backend of this request shares one deadline.
        let deadline = Instant::now() + self.endpoint.timeout();

        let path_params: HashMap<String, String> = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let (parts, body) = request.into_parts();

        let body_bytes = if forwards_body(&parts.method) {
            match axum::body::to_bytes(body, usize::MAX).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    // Degrade to an empty body rather than failing the
                    // whole aggregation.
                    tracing::error!(error = %e, "Failed to read request body");
                    Bytes::new()
                }
            }
        } else {
            Bytes::new()
        };

        let responses = self
            .fan_out(&parts.method, &parts.headers, &path_params, body_bytes, deadline)
            .await;

        if !responses.iter().any(|r| r.error.is_none()) {
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "All backends failed"}),
            );
        }

        let (merged, all_completed) = self.merger.merge(&responses);

        if tracing::enabled!(tracing::Level::TRACE) {
            tracing::trace!(
                endpoint = %self.endpoint.endpoint,
                method = %self.endpoint.method,
                all_completed,
                aggregated_response = %merged,
                "aggregated response body"
            );
        }

        let body = match serde_json::to_vec(&merged) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode merged response");
                return json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "failed to encode response"}),
                );
            }
        };

        Response::builder()
            .status(StatusCode::OK)
            .header(AGGREGATION_COMPLETED_HEADER, all_completed.to_string())
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to build aggregated response");
                let mut response = Response::new(Body::empty());
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response
            })
    }

    /// One spawned task per backend; each writes its result to its
    /// configured slot, so response order always matches backend order.
    /// All tasks run to completion — a failure never cancels its siblings.
    async fn fan_out(
        &self,
        method: &Method,
        inbound_headers: &HeaderMap,
        path_params: &HashMap<String, String>,
        body_bytes: Bytes,
        deadline: Instant,
    ) -> Vec<BackendResponse> {
        let mut tasks = Vec::with_capacity(self.endpoint.backends.len());

        for backend in self.endpoint.backends.iter().cloned() {
            let client = self.client.clone();
            let method = method.clone();
            let url = build_url(&backend, path_params);
            let headers = filter_headers(inbound_headers, &backend.remove_headers);
            // Each task gets its own view of the shared immutable buffer.
            let body = (!body_bytes.is_empty()).then(|| body_bytes.clone());

            tasks.push(tokio::spawn(async move {
                let encoding = backend.encoding();
                let result = client
                    .fetch(BackendRequest {
                        method,
                        url,
                        encoding,
                        headers,
                        body,
                        deadline,
                    })
                    .await;

                match result {
                    Ok(data) => BackendResponse {
                        backend,
                        data,
                        error: None,
                    },
                    Err(error) => BackendResponse {
                        backend,
                        data: None,
                        error: Some(error),
                    },
                }
            }));
        }

        let mut responses = Vec::with_capacity(tasks.len());
        for (task, backend) in tasks.into_iter().zip(self.endpoint.backends.iter()) {
            responses.push(match task.await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, backend = %backend.host, "Backend task failed");
                    BackendResponse {
                        backend: backend.clone(),
                        data: None,
                        error: Some(BackendError::Transport(format!("backend task failed: {e}"))),
                    }
                }
            });
        }
        responses
    }
}

/// Body-forwarding methods; a closed set.
pub fn forwards_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Materialize a backend URL: substitute `{name}` captures verbatim (no
/// URL-encoding) and join host and pattern with exactly one `/`.
pub fn build_url(backend: &Backend, path_params: &HashMap<String, String>) -> String {
    let base_url = &backend.host;
    let mut pattern = backend.url_pattern().to_string();

    for (key, value) in path_params {
        pattern = pattern.replace(&format!("{{{key}}}"), value);
    }

    match (base_url.ends_with('/'), pattern.starts_with('/')) {
        (true, true) => format!("{}{}", base_url, &pattern[1..]),
        (false, false) => format!("{base_url}/{pattern}"),
        _ => format!("{base_url}{pattern}"),
    }
}

/// Forward every inbound header except the backend's remove list
/// (case-insensitive) and the fixed hop-by-hop set. Multi-valued headers
/// collapse to their first value.
pub fn filter_headers(inbound: &HeaderMap, remove_headers: &[String]) -> HeaderMap {
    let remove: Vec<String> = remove_headers.iter().map(|h| h.to_lowercase()).collect();

    let mut headers = HeaderMap::new();
    for name in inbound.keys() {
        let lower = name.as_str().to_lowercase();
        if HOP_BY_HOP_HEADERS.contains(&lower.as_str()) {
            continue;
        }
        if remove.iter().any(|r| r == &lower) {
            continue;
        }
        if let Some(value) = inbound.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }
    headers
}
