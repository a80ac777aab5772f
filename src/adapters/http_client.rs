use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Uri, header};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use serde_json::Value;
use tokio::time::timeout_at;

use crate::{
    config::Encoding,
    metrics,
    ports::{BackendClient, BackendError, BackendRequest, BackendResult},
};

// Error-status bodies are carried into the error for diagnostics, truncated
// so a misbehaving backend cannot blow up log records.
const STATUS_BODY_EXCERPT_LIMIT: usize = 512;

/// Backend HTTP client over Hyper with Rustls (HTTP/1.1 + HTTP/2 via ALPN).
///
/// Responsibilities:
/// * Forwards the caller's headers verbatim, adding only `Accept` (always)
///   and `Content-Type` (body present, none forwarded)
/// * Executes under the shared per-request deadline
/// * Decodes the response body by declared encoding into a dynamic value
///
/// The adapter never advertises `Accept-Encoding`; response decompression is
/// the transport layer's concern and backends are not asked to compress.
pub struct HttpBackendClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpBackendClient {
    /// Create a new backend client with native root certificates.
    pub fn new() -> eyre::Result<Self> {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        for cert in native_certs.certs {
            if root_cert_store.add(cert).is_err() {
                tracing::warn!("Failed to add native certificate to rustls RootCertStore");
            }
        }
        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https_connector);

        Ok(Self { client })
    }

    fn build_request(&self, request: &BackendRequest) -> BackendResult<Request<Full<Bytes>>> {
        let uri: Uri = request
            .url
            .parse()
            .map_err(|e| BackendError::InvalidRequest(format!("invalid URL {}: {e}", request.url)))?;

        let mut builder = Request::builder().method(request.method.clone()).uri(uri);

        let has_content_type = request.headers.contains_key(header::CONTENT_TYPE);
        if let Some(headers) = builder.headers_mut() {
            for (name, value) in &request.headers {
                headers.insert(name.clone(), value.clone());
            }
            // The Accept header always reflects the declared encoding.
            headers.insert(
                header::ACCEPT,
                header::HeaderValue::from_static(request.encoding.content_type()),
            );
            if request.body.is_some() && !has_content_type {
                headers.insert(
                    header::CONTENT_TYPE,
                    header::HeaderValue::from_static(request.encoding.content_type()),
                );
            }
        }

        let body = request.body.clone().unwrap_or_default();
        builder
            .body(Full::new(body))
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn fetch(&self, request: BackendRequest) -> BackendResult<Option<Value>> {
        tracing::debug!(
            method = %request.method,
            url = %request.url,
            encoding = %request.encoding,
            headers = ?request.headers,
            body = %request
                .body
                .as_deref()
                .map(String::from_utf8_lossy)
                .unwrap_or_default(),
            "outgoing backend request"
        );

        let outgoing = self.build_request(&request)?;

        let timer = metrics::BackendRequestTimer::start(&request.url, request.method.as_str());

        let response = match timeout_at(request.deadline, self.client.request(outgoing)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                timer.finish(0);
                return Err(BackendError::Transport(e.to_string()));
            }
            Err(_) => {
                timer.finish(0);
                return Err(BackendError::Timeout);
            }
        };

        let status = response.status();
        let (parts, body) = response.into_parts();

        let body = match timeout_at(request.deadline, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                timer.finish(status.as_u16());
                return Err(BackendError::Transport(format!(
                    "failed to read response body: {e}"
                )));
            }
            Err(_) => {
                timer.finish(status.as_u16());
                return Err(BackendError::Timeout);
            }
        };

        timer.finish(status.as_u16());

        tracing::trace!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            response_headers = ?parts.headers,
            response_body = %String::from_utf8_lossy(&body),
            "backend response received"
        );

        if status.as_u16() >= 400 {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }

        if body.is_empty() {
            return Ok(None);
        }

        decode(&body, request.encoding).map(Some)
    }
}

/// Decode a response body into a dynamic value per the declared encoding.
pub fn decode(body: &[u8], encoding: Encoding) -> BackendResult<Value> {
    let result = match encoding {
        Encoding::Json => serde_json::from_slice(body).map_err(|e| e.to_string()),
        Encoding::Yaml => serde_yaml::from_slice(body).map_err(|e| e.to_string()),
        Encoding::Xml => quick_xml::de::from_reader(body).map_err(|e| e.to_string()),
    };

    result.map_err(|message| BackendError::Decode { encoding, message })
}

fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= STATUS_BODY_EXCERPT_LIMIT {
        text.into_owned()
    } else {
        let mut end = STATUS_BODY_EXCERPT_LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text[..end].to_string()
    }
}
