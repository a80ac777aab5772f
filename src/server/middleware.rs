//! Middleware wrapping every handler: request logging, request tracing, and
//! the panic-recovery response. Compression is layered in by the router
//! builder (`tower-http`); these functions stay stateless.
use std::{any::Any, net::SocketAddr, time::Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{StatusCode, header};
use tracing::Instrument;
use uuid::Uuid;

use crate::metrics;

/// Log one record per completed request, WARN for error statuses.
pub async fn log_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or_default().to_string();
    let user_agent = header_str(&request, header::USER_AGENT);
    let referer = header_str(&request, header::REFERER);
    let content_type = header_str(&request, header::CONTENT_TYPE);
    let content_length = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_default();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration = start.elapsed();
    let response_size = http_body::Body::size_hint(response.body())
        .exact()
        .unwrap_or(0);

    metrics::record_request(&path, method.as_str(), status, duration.as_secs_f64());

    if status >= 400 {
        tracing::warn!(
            method = %method,
            path = %path,
            query = %query,
            status,
            duration_ms = duration.as_millis() as u64,
            response_size,
            user_agent = %user_agent,
            remote_addr = %remote_addr,
            referer = %referer,
            content_type = %content_type,
            content_length,
            "HTTP request"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            query = %query,
            status,
            duration_ms = duration.as_millis() as u64,
            response_size,
            user_agent = %user_agent,
            remote_addr = %remote_addr,
            referer = %referer,
            content_type = %content_type,
            content_length,
            "HTTP request"
        );
    }

    response
}

/// Run the rest of the stack inside a per-request span.
pub async fn trace_requests(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "request",
        http.method = %request.method(),
        http.path = %request.uri().path(),
        request_id = %request_id,
    );
    next.run(request).instrument(span).await
}

/// Compressed responses are cache-keyed on the negotiated encoding.
pub async fn vary_accept_encoding(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if response.headers().contains_key(header::CONTENT_ENCODING) {
        response.headers_mut().insert(
            header::VARY,
            header::HeaderValue::from_static("accept-encoding"),
        );
    }
    response
}

/// Recovery response for panicking handlers.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> hyper::Response<Full<Bytes>> {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Recovered from panic in handler");

    hyper::Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::from(r#"{"error":"internal server error"}"#))
        .unwrap_or_else(|_| hyper::Response::new(Full::from(r#"{"error":"internal server error"}"#)))
}

fn header_str(request: &Request<Body>, name: header::HeaderName) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
