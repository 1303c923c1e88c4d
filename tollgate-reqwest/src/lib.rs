//! reqwest transport for tollgate.
//!
//! [`ReqwestTransport`] implements [`tollgate_core::Transport`] on top of a
//! [`reqwest::Client`]. Connection pooling, TLS and timeouts are configured
//! on the reqwest client you pass in.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use tollgate::{Client, ClientConfig};
//! use tollgate_reqwest::ReqwestTransport;
//!
//! let http = reqwest::Client::builder()
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let client = Client::builder(ClientConfig::new("https://api.example.com"))
//!     .transport(ReqwestTransport::new(http))
//!     .build();
//! # Ok::<(), reqwest::Error>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]

use async_trait::async_trait;
use tollgate_core::{Transport, TransportError, TransportRequest, TransportResponse};
use tracing::trace;

/// [`Transport`] backed by a [`reqwest::Client`].
///
/// The response body is buffered in full before it is returned.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wraps an existing reqwest client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying reqwest client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl From<reqwest::Client> for ReqwestTransport {
    fn from(client: reqwest::Client) -> Self {
        Self::new(client)
    }
}

fn map_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_connect() || error.is_request() {
        TransportError::Connection(Box::new(error))
    } else {
        TransportError::Other(Box::new(error))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let TransportRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let mut builder = self.client.request(method, url.as_str()).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_error)?;
        trace!(%url, %status, bytes = body.len(), "Response received");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
