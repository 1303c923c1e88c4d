//! The request pipeline and its outward operations.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use http::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tollgate_core::{
    AuthTokens, CacheStatus, CacheStore, TokenStore, Transport, TransportError, TransportRequest,
    TransportResponse,
};
use tracing::{Instrument, debug, debug_span, warn};

use crate::auth::AuthInterceptor;
use crate::cache::{CacheInterceptor, Lookup};
use crate::config::ClientConfig;
use crate::metrics;
use crate::offload::{OffloadConfig, OffloadManager};
use crate::request::RequestOptions;
use crate::result::ApiResult;
use crate::token_store::MemoryTokenStore;

/// Header carrying the cache provenance of a response.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    auth: AuthInterceptor,
    cache: Option<CacheInterceptor>,
    offload: OffloadManager,
}

/// HTTP client with bearer authentication and response caching.
///
/// Requests flow through the pipeline in a fixed order:
///
/// ```text
/// auth (attach bearer) ─► cache lookup ─► transport ─► cache write ─► auth (401 refresh)
/// ```
///
/// Cloning is cheap; clones share stores, the refresh queue and background
/// tasks.
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
/// use tollgate::{Client, ClientConfig, RequestOptions};
/// # use tollgate::{Transport, TransportError, TransportRequest, TransportResponse};
/// # struct MyTransport;
/// # #[async_trait::async_trait]
/// # impl Transport for MyTransport {
/// #     async fn send(&self, _: TransportRequest) -> Result<TransportResponse, TransportError> {
/// #         unimplemented!()
/// #     }
/// # }
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
/// }
///
/// # async fn run() {
/// let client = Client::builder(ClientConfig::new("https://api.example.com"))
///     .transport(MyTransport)
///     .build();
///
/// client.login("alice", "secret").await;
/// let users = client.get::<Vec<User>>("/users", RequestOptions::new()).await;
/// if users.success {
///     println!("{} users ({:?})", users.data.unwrap_or_default().len(), users.cache_status);
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .field("caching", &self.inner.cache.is_some())
            .finish_non_exhaustive()
    }
}

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, the transport has not been
/// configured yet.
#[derive(Debug, Clone, Copy)]
pub struct NotSet;

/// Builder for [`Client`].
pub struct ClientBuilder<T> {
    config: ClientConfig,
    transport: T,
    token_store: Option<Arc<dyn TokenStore>>,
    cache_store: Option<Arc<dyn CacheStore>>,
}

impl Client {
    /// Starts building a client.
    pub fn builder(config: ClientConfig) -> ClientBuilder<NotSet> {
        ClientBuilder {
            config,
            transport: NotSet,
            token_store: None,
            cache_store: None,
        }
    }
}

impl<T> ClientBuilder<T> {
    /// Sets the transport requests are sent through.
    pub fn transport<N>(self, transport: N) -> ClientBuilder<Arc<dyn Transport>>
    where
        N: Transport + 'static,
    {
        ClientBuilder {
            config: self.config,
            transport: Arc::new(transport),
            token_store: self.token_store,
            cache_store: self.cache_store,
        }
    }

    /// Sets the token store.
    ///
    /// Without one the client falls back to [`MemoryTokenStore`], which is
    /// ephemeral: tokens are lost when the process exits and every restart
    /// needs a fresh login. Pass `tollgate_fs::EncryptedFileTokenStore` to
    /// keep the session across restarts.
    pub fn token_store<S>(self, store: S) -> Self
    where
        S: TokenStore + 'static,
    {
        Self {
            token_store: Some(Arc::new(store)),
            ..self
        }
    }

    /// Sets the cache store. Without one, caching is off.
    pub fn cache_store<S>(self, store: S) -> Self
    where
        S: CacheStore + 'static,
    {
        Self {
            cache_store: Some(Arc::new(store)),
            ..self
        }
    }
}

impl ClientBuilder<Arc<dyn Transport>> {
    /// Builds the client.
    ///
    /// Tokens live in memory only unless [`token_store`](Self::token_store)
    /// was called.
    pub fn build(self) -> Client {
        let Self {
            config,
            transport,
            token_store,
            cache_store,
        } = self;

        let offload = OffloadManager::new(OffloadConfig::from(&config.offload));
        let token_store = token_store.unwrap_or_else(|| Arc::new(MemoryTokenStore::new()));
        let auth = AuthInterceptor::new(&config, token_store, Arc::clone(&transport));

        let cache = match cache_store {
            Some(store) if config.cache.enabled => Some(CacheInterceptor::new(
                config.cache.clone(),
                store,
                Arc::clone(&transport),
                offload.clone(),
            )),
            Some(_) => None,
            None => {
                if config.cache.enabled {
                    warn!("Caching is enabled but no cache store was configured, disabling it");
                }
                None
            }
        };

        Client {
            inner: Arc::new(ClientInner {
                config,
                transport,
                auth,
                cache,
                offload,
            }),
        }
    }
}

impl Client {
    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Exchanges credentials for a token pair and stores it.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<AuthTokens> {
        match self.inner.auth.login(username, password).await {
            Ok(tokens) => ApiResult::ok(tokens),
            Err(error) => error.into(),
        }
    }

    /// Removes stored tokens. The response cache is left as is.
    pub async fn logout(&self) -> ApiResult<()> {
        match self.inner.auth.logout().await {
            Ok(()) => ApiResult::ok(()),
            Err(error) => error.into(),
        }
    }

    /// Refreshes the token pair now.
    ///
    /// Shares the refresh with any automatic refresh already in flight.
    pub async fn refresh_token(&self) -> ApiResult<AuthTokens> {
        match self.inner.auth.refresh().await {
            Ok(tokens) => ApiResult::ok(tokens),
            Err(error) => error.into(),
        }
    }

    /// Currently stored tokens.
    pub async fn get_tokens(&self) -> Option<AuthTokens> {
        self.inner.auth.tokens().await
    }

    /// Whether usable tokens are stored. Never touches the network.
    pub async fn is_authenticated(&self) -> bool {
        self.inner.auth.is_authenticated().await
    }

    /// Removes every cached response.
    pub async fn clear_cache(&self) -> ApiResult<()> {
        let Some(cache) = &self.inner.cache else {
            return ApiResult::ok(());
        };
        match cache.clear().await {
            Ok(()) => ApiResult::ok(()),
            Err(error) => ApiResult::failure(format!("failed to clear cache: {error}")),
        }
    }

    /// Waits for background revalidations to finish.
    pub async fn wait_for_background(&self) {
        self.inner.offload.wait_all().await;
    }

    /// Stops background work before the client is dropped.
    ///
    /// Revalidations still running after `grace` are aborted; their cache
    /// entries stay as they were. Requests keep working afterwards.
    pub async fn shutdown(&self, grace: Duration) {
        if self.inner.offload.wait_all_timeout(grace).await {
            return;
        }
        warn!(?grace, "Background revalidations still running, aborting them");
        self.inner.offload.cancel_all();
        self.inner.offload.wait_all().await;
    }

    /// Sends a request through the pipeline and decodes the JSON response.
    pub async fn request<T>(&self, method: Method, path: &str, options: RequestOptions) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let span = debug_span!("request", %method, path);
        async move {
            let request = match self.prepare(method, path, &options) {
                Ok(request) => request,
                Err(error) => return ApiResult::from_transport_error(&error),
            };

            let cancel = options.cancel.clone();
            let pipeline = self.execute(request, options.no_cache);
            let outcome = match cancel {
                Some(token) => tokio::select! {
                    outcome = pipeline => outcome,
                    _ = token.cancelled() => {
                        debug!("Request cancelled");
                        Err(TransportError::Cancelled)
                    }
                },
                None => pipeline.await,
            };

            match outcome {
                Ok((mut response, cache_status)) => {
                    if let Some(status) = cache_status {
                        response.headers.insert(
                            CACHE_STATUS_HEADER,
                            HeaderValue::from_static(status.as_header_value()),
                        );
                    }
                    ApiResult::from_response(response, cache_status)
                }
                Err(error) => ApiResult::from_transport_error(&error),
            }
        }
        .instrument(span)
        .await
    }

    /// `GET` shorthand for [`request`](Self::request).
    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(Method::GET, path, options).await
    }

    /// `POST` shorthand for [`request`](Self::request).
    pub async fn post<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(Method::POST, path, options).await
    }

    /// `PUT` shorthand for [`request`](Self::request).
    pub async fn put<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(Method::PUT, path, options).await
    }

    /// `PATCH` shorthand for [`request`](Self::request).
    pub async fn patch<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(Method::PATCH, path, options).await
    }

    /// `DELETE` shorthand for [`request`](Self::request).
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<T> {
        self.request(Method::DELETE, path, options).await
    }

    fn prepare(
        &self,
        method: Method,
        path: &str,
        options: &RequestOptions,
    ) -> Result<TransportRequest, TransportError> {
        if let Some(error) = &options.error {
            return Err(TransportError::InvalidRequest(error.clone()));
        }

        let mut url = self.inner.config.url_for(path);
        if let Some(query) = &options.query {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(query);
        }

        let mut request = TransportRequest::new(method, url);
        request.headers = options.headers.clone();
        request.body = options.body.clone();
        Ok(request)
    }

    async fn execute(
        &self,
        mut request: TransportRequest,
        no_cache: bool,
    ) -> Result<(TransportResponse, Option<CacheStatus>), TransportError> {
        let inner = &self.inner;
        inner.auth.authorize(&mut request).await;

        let fingerprint = match &inner.cache {
            Some(cache) => match cache.lookup(&request, no_cache).await {
                Lookup::Cached { response, status } => {
                    metrics::record_cache_status(status);
                    return Ok((response, Some(status)));
                }
                Lookup::Fetch { fingerprint } => Some(fingerprint),
                Lookup::Skip => None,
            },
            None => None,
        };

        let response = inner.transport.send(request.clone()).await?;

        if let (Some(cache), Some(fingerprint)) = (&inner.cache, fingerprint.as_ref()) {
            cache.store(fingerprint.clone(), &response).await;
        }
        let cache_status = fingerprint.map(|_| CacheStatus::Miss);
        if let Some(status) = cache_status {
            metrics::record_cache_status(status);
        }

        if response.status == http::StatusCode::UNAUTHORIZED && inner.auth.handles(&request) {
            let replayed = inner
                .auth
                .on_unauthorized(request, response)
                .await?;
            return Ok((replayed, cache_status));
        }

        Ok((response, cache_status))
    }
}
