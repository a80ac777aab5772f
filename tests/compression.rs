//! Response compression contract: gzip only above the size threshold.
use std::{io::Read, sync::Arc, time::Duration};

use axum::{Router, body::Body};
use flate2::read::GzDecoder;
use hyper::{Request, StatusCode, header};
use plexus::{
    adapters::HttpBackendClient,
    config::{Backend, Config, Endpoint},
    server::Server,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers::method};

async fn router_with_payload(payload: Value) -> (Router, MockServer) {
    let backend_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload))
        .mount(&backend_server)
        .await;

    let mut config = Config {
        endpoints: vec![Endpoint {
            endpoint: "/data".to_string(),
            method: "GET".to_string(),
            timeout: Some(Duration::from_secs(5)),
            encoding: None,
            backends: vec![Backend {
                host: backend_server.uri(),
                ..Backend::default()
            }],
        }],
        ..Config::default()
    };
    config.apply_defaults();

    let client = Arc::new(HttpBackendClient::new().unwrap());
    let router = Server::new(Arc::new(config), client)
        .unwrap()
        .router()
        .clone();
    (router, backend_server)
}

fn large_payload(size: usize) -> Value {
    json!({"data": "x".repeat(size)})
}

#[tokio::test]
async fn large_bodies_are_gzipped() {
    let payload = large_payload(2000);
    let (router, _backend) = router_with_payload(payload.clone()).await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/data")
                .header(header::ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).unwrap(),
        "gzip"
    );
    assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    let vary = response
        .headers()
        .get(header::VARY)
        .expect("vary header present")
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(vary.contains("accept-encoding"));

    let compressed = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let mut decoder = GzDecoder::new(compressed.as_ref());
    let mut decompressed = String::new();
    decoder.read_to_string(&mut decompressed).unwrap();
    let round_tripped: Value = serde_json::from_str(&decompressed).unwrap();
    assert_eq!(round_tripped, payload);
}

#[tokio::test]
async fn small_bodies_stay_uncompressed() {
    let payload = large_payload(800);
    let (router, _backend) = router_with_payload(payload.clone()).await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/data")
                .header(header::ACCEPT_ENCODING, "gzip")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, payload);
}

#[tokio::test]
async fn clients_without_gzip_get_identity() {
    let payload = large_payload(2000);
    let (router, _backend) = router_with_payload(payload.clone()).await;

    let response = router
        .oneshot(
            Request::builder()
                .uri("/data")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let parsed: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed, payload);
}
