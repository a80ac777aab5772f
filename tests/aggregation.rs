//! End-to-end aggregation scenarios driven through the full router with
//! mocked backends.
use std::{sync::Arc, time::Duration};

use axum::{Router, body::Body};
use hyper::{Request, StatusCode, header};
use plexus::{
    adapters::HttpBackendClient,
    config::{Backend, Config, Encoding, Endpoint},
    server::Server,
};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string, method, path},
};

fn backend(host: &str) -> Backend {
    Backend {
        host: host.to_string(),
        ..Backend::default()
    }
}

fn config_for(endpoint_path: &str, http_method: &str, backends: Vec<Backend>) -> Config {
    let mut config = Config {
        endpoints: vec![Endpoint {
            endpoint: endpoint_path.to_string(),
            method: http_method.to_string(),
            timeout: Some(Duration::from_secs(5)),
            encoding: None,
            backends,
        }],
        ..Config::default()
    };
    config.apply_defaults();
    config
}

fn router_for(config: Config) -> Router {
    let client = Arc::new(HttpBackendClient::new().unwrap());
    Server::new(Arc::new(config), client)
        .unwrap()
        .router()
        .clone()
}

async fn mock_json_backend(body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

async fn body_json(response: hyper::Response<axum::body::Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn two_backend_merge_sets_completed_header() {
    let first = mock_json_backend(json!({"id": 1, "name": "John"})).await;
    let second = mock_json_backend(json!({"email": "john@x", "age": 30})).await;

    let config = config_for(
        "/user",
        "GET",
        vec![backend(&first.uri()), backend(&second.uri())],
    );
    let response = router_for(config)
        .oneshot(Request::builder().uri("/user").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-api-aggregation-completed")
            .unwrap(),
        "true"
    );
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(
        body_json(response).await,
        json!({"id": 1, "name": "John", "email": "john@x", "age": 30})
    );
}

#[tokio::test]
async fn group_directive_wraps_responses() {
    let first = mock_json_backend(json!({"id": 1, "name": "John"})).await;
    let second = mock_json_backend(json!({"email": "john@x", "age": 30})).await;

    let mut user_backend = backend(&first.uri());
    user_backend.group = Some("user".to_string());
    let mut profile_backend = backend(&second.uri());
    profile_backend.group = Some("profile".to_string());

    let config = config_for("/user", "GET", vec![user_backend, profile_backend]);
    let response = router_for(config)
        .oneshot(Request::builder().uri("/user").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({
            "user": {"id": 1, "name": "John"},
            "profile": {"email": "john@x", "age": 30}
        })
    );
}

#[tokio::test]
async fn concat_directive_flattens_arrays() {
    let first = mock_json_backend(json!([{"id": 1}, {"id": 2}])).await;
    let second = mock_json_backend(json!([{"id": 3}])).await;

    let mut b1 = backend(&first.uri());
    b1.concat = Some("items".to_string());
    let mut b2 = backend(&second.uri());
    b2.concat = Some("items".to_string());

    let config = config_for("/items", "GET", vec![b1, b2]);
    let response = router_for(config)
        .oneshot(Request::builder().uri("/items").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({"items": [{"id": 1}, {"id": 2}, {"id": 3}]})
    );
}

#[tokio::test]
async fn partial_failure_returns_200_with_flag() {
    let healthy = mock_json_backend(json!({"id": 1})).await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"late": true}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;

    let mut config = config_for(
        "/user",
        "GET",
        vec![backend(&healthy.uri()), backend(&slow.uri())],
    );
    config.endpoints[0].timeout = Some(Duration::from_millis(300));

    let response = router_for(config)
        .oneshot(Request::builder().uri("/user").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-api-aggregation-completed")
            .unwrap(),
        "false"
    );
    assert_eq!(body_json(response).await, json!({"id": 1}));
}

#[tokio::test]
async fn all_backends_failed_returns_500() {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&broken)
        .await;

    let also_broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&also_broken)
        .await;

    let config = config_for(
        "/user",
        "GET",
        vec![backend(&broken.uri()), backend(&also_broken.uri())],
    );
    let response = router_for(config)
        .oneshot(Request::builder().uri("/user").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({"error": "All backends failed"}));
}

#[tokio::test]
async fn transformation_pipeline_end_to_end() {
    let raw = mock_json_backend(json!({
        "response": {"data": {"id": 1, "fullName": "John Doe", "email": "x", "secret": "s"}}
    }))
    .await;

    let mut shaped = backend(&raw.uri());
    shaped.target = Some("response.data".to_string());
    shaped.allow = vec!["id".into(), "fullName".into(), "email".into()];
    shaped.mapping = [("fullName".to_string(), "name".to_string())].into();

    let config = config_for("/user", "GET", vec![shaped]);
    let response = router_for(config)
        .oneshot(Request::builder().uri("/user").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({"id": 1, "name": "John Doe", "email": "x"})
    );
}

#[tokio::test]
async fn path_params_substitute_into_backend_url() {
    let profile = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/42/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&profile)
        .await;

    let mut b = backend(&profile.uri());
    b.url_pattern = Some("/api/{id}/profile".to_string());

    let config = config_for("/users/{id}", "GET", vec![b]);
    let response = router_for(config)
        .oneshot(
            Request::builder()
                .uri("/users/42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"id": 42}));
    profile.verify().await;
}

#[tokio::test]
async fn post_body_is_replayed_to_every_backend() {
    let request_body = r#"{"shared": "data", "count": 42}"#;

    let mut backends = Vec::new();
    let mut servers = Vec::new();
    for _ in 0..3 {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test"))
            .and(body_string(request_body))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .expect(1)
            .mount(&server)
            .await;
        backends.push(backend(&server.uri()));
        servers.push(server);
    }

    let config = config_for("/test", "POST", vec![
        backends[0].clone(),
        backends[1].clone(),
        backends[2].clone(),
    ]);
    let response = router_for(config)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/test")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(request_body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    for server in &servers {
        server.verify().await;
    }
}

#[tokio::test]
async fn get_requests_do_not_forward_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(body_string(""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for("/test", "GET", vec![backend(&server.uri())]);
    let response = router_for(config)
        .oneshot(
            Request::builder()
                .uri("/test")
                .body(Body::from("ignored"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    server.verify().await;
}

#[tokio::test]
async fn headers_forward_minus_removed_and_hop_by_hop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let mut b = backend(&server.uri());
    b.remove_headers = vec!["X-Secret".to_string()];

    let config = config_for("/test", "GET", vec![b]);
    let response = router_for(config)
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("authorization", "Bearer token123")
                .header("x-secret", "hide-me")
                .header("accept-encoding", "gzip, deflate")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let headers = &received[0].headers;
    assert_eq!(headers.get("authorization").unwrap(), "Bearer token123");
    assert!(headers.get("x-secret").is_none());
    // Accept reflects the backend encoding, not the inbound Accept.
    assert_eq!(headers.get("accept").unwrap(), "application/json");
}

#[tokio::test]
async fn sole_backend_array_shape_is_preserved() {
    let list = mock_json_backend(json!([1, 2, 3])).await;

    let config = config_for("/list", "GET", vec![backend(&list.uri())]);
    let response = router_for(config)
        .oneshot(Request::builder().uri("/list").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(body_json(response).await, json!([1, 2, 3]));
}

#[tokio::test]
async fn yaml_backend_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("id: 1\nname: test\n", "application/yaml"),
        )
        .mount(&server)
        .await;

    let mut b = backend(&server.uri());
    b.encoding = Some(Encoding::Yaml);

    let config = config_for("/y", "GET", vec![b]);
    let response = router_for(config)
        .oneshot(Request::builder().uri("/y").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(body_json(response).await, json!({"id": 1, "name": "test"}));

    let received = server.received_requests().await.unwrap();
    assert_eq!(
        received[0].headers.get("accept").unwrap(),
        "application/yaml"
    );
}

#[tokio::test]
async fn xml_backend_is_decoded_into_mappings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "<user><id>1</id><name>test</name></user>",
            "application/xml",
        ))
        .mount(&server)
        .await;

    let mut b = backend(&server.uri());
    b.encoding = Some(Encoding::Xml);
    b.group = Some("user".to_string());

    let config = config_for("/x", "GET", vec![b]);
    let response = router_for(config)
        .oneshot(Request::builder().uri("/x").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let merged = body_json(response).await;
    let user = merged["user"].as_object().expect("user is a mapping");
    assert!(user.contains_key("id"));
    assert!(user.contains_key("name"));
}

#[tokio::test]
async fn decode_failure_counts_as_backend_failure() {
    let garbled = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("not json at all", "text/plain"))
        .mount(&garbled)
        .await;
    let healthy = mock_json_backend(json!({"ok": true})).await;

    let config = config_for(
        "/mixed",
        "GET",
        vec![backend(&garbled.uri()), backend(&healthy.uri())],
    );
    let response = router_for(config)
        .oneshot(Request::builder().uri("/mixed").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-api-aggregation-completed")
            .unwrap(),
        "false"
    );
    assert_eq!(body_json(response).await, json!({"ok": true}));
}

#[tokio::test]
async fn empty_backend_body_is_skipped() {
    let empty = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&empty)
        .await;
    let healthy = mock_json_backend(json!({"ok": true})).await;

    let config = config_for(
        "/sparse",
        "GET",
        vec![backend(&empty.uri()), backend(&healthy.uri())],
    );
    let response = router_for(config)
        .oneshot(
            Request::builder()
                .uri("/sparse")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-api-aggregation-completed")
            .unwrap(),
        "true"
    );
    assert_eq!(body_json(response).await, json!({"ok": true}));
}
