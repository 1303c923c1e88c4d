#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use http::StatusCode;
use tollgate::{
    AuthTokens, Client, ClientBuilder, ClientConfig, MemoryTokenStore, Transport, TransportError,
    TransportRequest, TransportResponse,
};
use tollgate_moka::MokaCacheStore;

pub const BASE_URL: &str = "https://api.test";

type Handler = dyn Fn(&TransportRequest, usize) -> TransportResponse + Send + Sync;

/// Scripted transport recording every request it receives.
///
/// The handler gets the request and the number of earlier calls to the same
/// path.
#[derive(Clone)]
pub struct MockTransport {
    handler: Arc<Handler>,
    delays: Arc<DashMap<String, Duration>>,
    bearer_delays: Arc<DashMap<(String, String), Duration>>,
    per_path: Arc<DashMap<String, AtomicUsize>>,
    log: Arc<Mutex<Vec<TransportRequest>>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&TransportRequest, usize) -> TransportResponse + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            delays: Arc::new(DashMap::new()),
            bearer_delays: Arc::new(DashMap::new()),
            per_path: Arc::new(DashMap::new()),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delays every response for `path`.
    pub fn delay(self, path: &str, delay: Duration) -> Self {
        self.delays.insert(path.to_owned(), delay);
        self
    }

    /// Delays responses for `path` only when sent with `token` as bearer.
    /// Takes precedence over [`delay`](Self::delay).
    pub fn delay_for_bearer(self, path: &str, token: &str, delay: Duration) -> Self {
        self.bearer_delays
            .insert((path.to_owned(), token.to_owned()), delay);
        self
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    pub fn total_calls(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<TransportRequest> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path() == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let path = request.path().to_owned();
        self.log.lock().unwrap().push(request.clone());
        let seen = self
            .per_path
            .entry(path.clone())
            .or_default()
            .fetch_add(1, Ordering::SeqCst);

        let by_bearer = bearer(&request)
            .and_then(|token| self.bearer_delays.get(&(path.clone(), token.to_owned())))
            .map(|delay| *delay);
        let delay = by_bearer.or_else(|| self.delays.get(&path).map(|delay| *delay));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok((self.handler)(&request, seen))
    }
}

pub fn json_response(status: StatusCode, body: serde_json::Value) -> TransportResponse {
    let mut response = TransportResponse::new(status, body.to_string());
    response
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

pub fn bearer(request: &TransportRequest) -> Option<&str> {
    request
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

pub fn tokens_body(access: &str, refresh: &str) -> TransportResponse {
    json_response(
        StatusCode::OK,
        serde_json::json!({ "access_token": access, "refresh_token": refresh }),
    )
}

pub fn builder(transport: &MockTransport, config: ClientConfig) -> ClientBuilder<Arc<dyn Transport>> {
    Client::builder(config).transport(transport.clone())
}

/// Client with an in-memory cache and no stored tokens.
pub fn caching_client(transport: &MockTransport, config: ClientConfig) -> Client {
    builder(transport, config)
        .cache_store(MokaCacheStore::new(1_000))
        .build()
}

/// Client without a cache holding `tokens`.
pub fn authed_client(transport: &MockTransport, tokens: AuthTokens) -> Client {
    builder(transport, ClientConfig::new(BASE_URL))
        .token_store(MemoryTokenStore::with_tokens(tokens))
        .build()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
