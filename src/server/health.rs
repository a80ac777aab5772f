use axum::{
    body::Body,
    response::Response,
};
use hyper::{StatusCode, Uri, header};
use serde_json::json;

/// `GET /livez`
pub async fn handle_liveness() -> Response {
    health_response("live")
}

/// `GET /readyz`
pub async fn handle_readiness() -> Response {
    health_response("ready")
}

/// Fallback for requests that match no configured endpoint.
pub async fn handle_not_found(uri: Uri) -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        json!({
            "error": "endpoint not found",
            "path": uri.path(),
        }),
    )
}

fn health_response(check: &str) -> Response {
    json_response(
        StatusCode::OK,
        json!({
            "status": "healthy",
            "check": check,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Build a JSON response, falling back to a bare 500 if the builder is
/// handed an invalid part (it is not, for the inputs used here).
pub fn json_response(status: StatusCode, value: serde_json::Value) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to build response");
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}
