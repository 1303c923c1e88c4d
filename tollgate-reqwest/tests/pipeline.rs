//! End-to-end tests of the tollgate pipeline over reqwest, against wiremock.

use serde_json::{Value, json};
use tollgate::{
    AuthTokens, CacheStatus, Client, ClientConfig, MemoryTokenStore, RequestOptions, Transport,
    TransportError, TransportRequest,
};
use tollgate_moka::MokaCacheStore;
use tollgate_reqwest::ReqwestTransport;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> Client {
    Client::builder(ClientConfig::new(server.uri()))
        .transport(ReqwestTransport::default())
        .cache_store(MokaCacheStore::new(100))
        .build()
}

#[tokio::test]
async fn cache_miss_then_hit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "Hello from server"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    let first = client.get::<Value>("/data", RequestOptions::new()).await;
    assert!(first.success);
    assert_eq!(first.cache_status, Some(CacheStatus::Miss));
    assert_eq!(first.headers.as_ref().unwrap()["x-cache-status"], "MISS");

    let second = client.get::<Value>("/data", RequestOptions::new()).await;
    assert_eq!(second.cache_status, Some(CacheStatus::Hit));
    assert_eq!(second.headers.as_ref().unwrap()["x-cache-status"], "HIT");
    assert_eq!(second.data.unwrap()["message"], "Hello from server");
}

#[tokio::test]
async fn response_headers_survive_caching() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/headers"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("\"body\"")
                .insert_header("X-Custom-Header", "custom-value"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let options = || RequestOptions::new().query(&[("page", "2")]);

    client.get::<String>("/headers", options()).await;
    let cached = client.get::<String>("/headers", options()).await;

    assert_eq!(cached.data.as_deref(), Some("body"));
    assert_eq!(cached.headers.unwrap()["x-custom-header"], "custom-value");
}

#[tokio::test]
async fn expired_access_token_is_refreshed_and_replayed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(header("authorization", "Bearer r1"))
        .and(body_json(json!({"refresh_token": "r1"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": "fresh", "refresh_token": "r2"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "alice"})))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "token expired"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder(ClientConfig::new(server.uri()))
        .transport(ReqwestTransport::default())
        .token_store(MemoryTokenStore::with_tokens(AuthTokens::new("stale", "r1")))
        .build();

    let me = client.get::<Value>("/me", RequestOptions::new()).await;
    assert!(me.success, "{:?}", me.message);
    assert_eq!(me.data.unwrap()["name"], "alice");
    assert_eq!(client.get_tokens().await, Some(AuthTokens::new("fresh", "r2")));
}

#[tokio::test]
async fn server_errors_are_results_not_transport_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({"error": "maintenance"})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);
    for _ in 0..2 {
        let result = client.get::<Value>("/broken", RequestOptions::new()).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.message.as_deref(), Some("maintenance"));
    }
}

#[tokio::test]
async fn refused_connection_maps_to_connection_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/gone", listener.local_addr().unwrap());
    drop(listener);

    let error = ReqwestTransport::default()
        .send(TransportRequest::new(http::Method::GET, url))
        .await
        .unwrap_err();
    assert!(matches!(error, TransportError::Connection(_)), "{error:?}");
}
