//! Bearer authentication with automatic refresh.
//!
//! The [`AuthInterceptor`] has two hooks in the pipeline:
//!
//! - **pre-send**: attach `Authorization: Bearer <access_token>` from the
//!   [`TokenStore`], except on the token and refresh endpoints themselves;
//! - **on `401`**: hand the request to the refresh coordinator, which runs at
//!   most one refresh at a time and replays every queued request once it
//!   completes.
//!
//! Expiry is never checked before sending. A request is only ever refreshed
//! reactively, after the server has rejected it.

mod refresh;

use std::sync::Arc;

use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method};
use serde::Serialize;
use tollgate_core::{
    AuthTokens, TokenStore, Transport, TransportError, TransportRequest, TransportResponse,
};
use tracing::{debug, warn};

use self::refresh::RefreshCoordinator;
use crate::config::{AuthConfig, ClientConfig};
use crate::error::AuthError;
use crate::result::error_message;

#[derive(Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

/// Credential injection, login and single-flight refresh.
pub(crate) struct AuthInterceptor {
    config: AuthConfig,
    token_url: String,
    refresh_url: String,
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
}

impl AuthInterceptor {
    pub(crate) fn new(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let token_url = config.url_for(&config.auth.token_path);
        let refresh_url = config.url_for(&config.auth.refresh_path);
        Self {
            config: config.auth.clone(),
            coordinator: RefreshCoordinator::new(
                Arc::clone(&store),
                Arc::clone(&transport),
                refresh_url.clone(),
            ),
            token_url,
            refresh_url,
            store,
            transport,
        }
    }

    /// Whether `request` takes part in automatic authentication.
    pub(crate) fn handles(&self, request: &TransportRequest) -> bool {
        self.config.enabled && !self.is_auth_endpoint(request)
    }

    fn is_auth_endpoint(&self, request: &TransportRequest) -> bool {
        let url = request
            .url
            .split(['?', '#'])
            .next()
            .unwrap_or(request.url.as_str());
        url == self.token_url || url == self.refresh_url
    }

    /// Pre-send hook: attaches the stored access token.
    pub(crate) async fn authorize(&self, request: &mut TransportRequest) {
        if !self.handles(request) {
            return;
        }
        match self.store.load().await {
            Ok(Some(tokens)) => {
                if let Err(error) = set_bearer(&mut request.headers, &tokens.access_token) {
                    warn!(%error, "Stored access token is not a valid header value");
                }
            }
            Ok(None) => {}
            Err(error) => {
                warn!(%error, store = self.store.name(), "Failed to load tokens, sending unauthenticated");
            }
        }
    }

    /// Post-receive hook for a `401` response.
    ///
    /// Returns `original` untouched when there is nothing to refresh with.
    pub(crate) async fn on_unauthorized(
        &self,
        request: TransportRequest,
        original: TransportResponse,
    ) -> Result<TransportResponse, TransportError> {
        let tokens = match self.store.load().await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                debug!("No stored tokens, passing 401 through");
                return Ok(original);
            }
            Err(error) => {
                warn!(%error, store = self.store.name(), "Failed to load tokens, passing 401 through");
                return Ok(original);
            }
        };
        if tokens.is_refresh_token_expired() {
            debug!("Refresh token expired, passing 401 through");
            return Ok(original);
        }

        // The request went out before the last refresh finished. Retry it with
        // the current token instead of starting another cycle.
        if let Some(sent) = bearer_of(&request.headers)
            && sent != tokens.access_token
            && !self.coordinator.is_busy()
        {
            debug!("Request carried a superseded token, replaying with the current one");
            let mut request = request;
            set_bearer(&mut request.headers, &tokens.access_token)?;
            return self.transport.send(request).await;
        }

        self.coordinator.replay_after_refresh(request, original).await
    }

    /// Exchanges credentials at the token endpoint and stores the result.
    pub(crate) async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, AuthError> {
        let body = serde_json::to_vec(&LoginBody { username, password })?;
        let mut request = TransportRequest::new(Method::POST, self.token_url.as_str()).with_body(body);
        request
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(AuthError::LoginRejected {
                status: response.status,
                message: Some(error_message(response.status, &response.body)),
            });
        }

        let tokens: AuthTokens = serde_json::from_slice(&response.body)?;
        self.store.save(&tokens).await?;
        debug!("Login succeeded");
        Ok(tokens)
    }

    /// Removes stored tokens.
    pub(crate) async fn logout(&self) -> Result<(), AuthError> {
        self.store.clear().await?;
        debug!("Logged out");
        Ok(())
    }

    /// Manually triggers a refresh, joining any refresh already in flight.
    pub(crate) async fn refresh(&self) -> Result<AuthTokens, AuthError> {
        let tokens = self.store.load().await?.ok_or(AuthError::NotAuthenticated)?;
        if tokens.is_refresh_token_expired() {
            return Err(AuthError::RefreshTokenExpired);
        }
        self.coordinator.refresh().await
    }

    /// Currently stored tokens.
    pub(crate) async fn tokens(&self) -> Option<AuthTokens> {
        match self.store.load().await {
            Ok(tokens) => tokens,
            Err(error) => {
                warn!(%error, store = self.store.name(), "Failed to load tokens");
                None
            }
        }
    }

    /// Whether usable credentials are stored: the access token is valid, or it
    /// can still be refreshed.
    pub(crate) async fn is_authenticated(&self) -> bool {
        self.tokens().await.is_some_and(|tokens| {
            !tokens.is_access_token_expired() || !tokens.is_refresh_token_expired()
        })
    }
}

/// Sets `Authorization: Bearer <token>`.
pub(crate) fn set_bearer(headers: &mut HeaderMap, token: &str) -> Result<(), TransportError> {
    let mut value = HeaderValue::try_from(format!("Bearer {token}"))
        .map_err(|_| TransportError::InvalidRequest("token is not a valid header value".into()))?;
    value.set_sensitive(true);
    headers.insert(AUTHORIZATION, value);
    Ok(())
}

fn bearer_of(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_store::MemoryTokenStore;
    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use http::StatusCode;

    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _: TransportRequest) -> Result<TransportResponse, TransportError> {
            Err(TransportError::Timeout)
        }
    }

    fn interceptor(tokens: Option<AuthTokens>) -> AuthInterceptor {
        let store = match tokens {
            Some(tokens) => MemoryTokenStore::with_tokens(tokens),
            None => MemoryTokenStore::new(),
        };
        AuthInterceptor::new(
            &ClientConfig::new("https://api.test/v1"),
            Arc::new(store),
            Arc::new(Unreachable),
        )
    }

    #[tokio::test]
    async fn authorize_attaches_bearer_except_on_auth_endpoints() {
        let auth = interceptor(Some(AuthTokens::new("acc", "ref")));

        let mut request = TransportRequest::new(Method::GET, "https://api.test/v1/users");
        auth.authorize(&mut request).await;
        assert_eq!(request.headers[AUTHORIZATION], "Bearer acc");

        let mut request = TransportRequest::new(Method::POST, "https://api.test/v1/auth/refresh?x=1");
        auth.authorize(&mut request).await;
        assert!(request.headers.get(AUTHORIZATION).is_none());
        assert!(!auth.handles(&request));
    }

    #[tokio::test]
    async fn expired_refresh_token_passes_401_through() {
        let expired = AuthTokens::new("acc", "ref").with_refresh_expiry(Utc::now() - Duration::seconds(1));
        let auth = interceptor(Some(expired));
        let original = TransportResponse::new(StatusCode::UNAUTHORIZED, "nope");

        let response = auth
            .on_unauthorized(
                TransportRequest::new(Method::GET, "https://api.test/v1/users"),
                original.clone(),
            )
            .await
            .unwrap();
        assert_eq!(response, original);
        assert!(matches!(auth.refresh().await, Err(AuthError::RefreshTokenExpired)));
    }

    #[tokio::test]
    async fn is_authenticated_follows_expiry() {
        let past = Utc::now() - Duration::minutes(1);
        let future = Utc::now() + Duration::minutes(1);

        assert!(!interceptor(None).is_authenticated().await);
        assert!(interceptor(Some(AuthTokens::new("a", "r"))).is_authenticated().await);

        let refreshable = AuthTokens::new("a", "r")
            .with_access_expiry(past)
            .with_refresh_expiry(future);
        assert!(interceptor(Some(refreshable)).is_authenticated().await);

        let dead = AuthTokens::new("a", "r")
            .with_access_expiry(past)
            .with_refresh_expiry(past);
        assert!(!interceptor(Some(dead)).is_authenticated().await);
    }
}
