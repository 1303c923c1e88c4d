//! The network capability the pipeline sends requests through.
//!
//! Connection handling, TLS and I/O belong to the transport. The pipeline
//! only needs `send(method, url, headers, body) -> response | error`.
//!
//! Any HTTP status is a successful transport round trip: a `401` or a `500`
//! comes back as `Ok(TransportResponse)`. [`TransportError`] is reserved for
//! failures to obtain a response at all.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use thiserror::Error;

/// Boxed error used by backends and transports to carry their native errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL including the query string.
    pub url: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Serialized request body, if any.
    pub body: Option<Bytes>,
}

impl TransportRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Sets the request body.
    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        Self {
            body: Some(body.into()),
            ..self
        }
    }

    /// Path component of the URL, without scheme, authority or query.
    pub fn path(&self) -> &str {
        let rest = match self.url.find("://") {
            Some(idx) => {
                let after_scheme = &self.url[idx + 3..];
                match after_scheme.find('/') {
                    Some(slash) => &after_scheme[slash..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        let end = rest.find(['?', '#']).unwrap_or(rest.len());
        &rest[..end]
    }
}

/// Response snapshot returned by the transport and stored in cache entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Fully buffered response body.
    pub body: Bytes,
}

impl TransportResponse {
    /// Creates a response with the given status and body and no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Whether the status is in `[200, 300)`.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Failure to obtain any response from the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connecting to or talking with the remote failed.
    #[error("connection error: {0}")]
    Connection(#[source] BoxError),

    /// The transport gave up waiting for a response.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,

    /// The request could not be built (bad URL, bad header).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Any other transport failure.
    #[error(transparent)]
    Other(BoxError),
}

/// Network capability consumed by the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a request and buffers the full response.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T> Transport for Box<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_strips_scheme_authority_and_query() {
        let req = TransportRequest::new(Method::GET, "https://api.test:8443/auth/token?x=1#frag");
        assert_eq!(req.path(), "/auth/token");

        let req = TransportRequest::new(Method::GET, "http://api.test");
        assert_eq!(req.path(), "/");

        let req = TransportRequest::new(Method::GET, "/relative/path?q");
        assert_eq!(req.path(), "/relative/path");
    }
}
