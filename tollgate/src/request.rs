//! Per-request options.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::HeaderMap;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

/// Options for a single [`Client::request`](crate::Client::request) call.
///
/// ```
/// use serde::Serialize;
/// use tollgate::RequestOptions;
///
/// #[derive(Serialize)]
/// struct Page {
///     page: u32,
/// }
///
/// let options = RequestOptions::new()
///     .query(&Page { page: 2 })
///     .header("x-trace-id", "abc")
///     .no_cache(true);
/// assert!(options.is_no_cache());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) query: Option<String>,
    pub(crate) body: Option<Bytes>,
    pub(crate) headers: HeaderMap,
    pub(crate) no_cache: bool,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) error: Option<String>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes `query` into the URL query string.
    pub fn query<Q: Serialize + ?Sized>(mut self, query: &Q) -> Self {
        match serde_urlencoded::to_string(query) {
            Ok(encoded) if encoded.is_empty() => {}
            Ok(encoded) => self.query = Some(encoded),
            Err(error) => self.fail(format!("invalid query: {error}")),
        }
        self
    }

    /// Serializes `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            Err(error) => self.fail(format!("invalid body: {error}")),
        }
        self
    }

    /// Uses `body` verbatim as the request body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a request header.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => self.fail(format!("invalid header {name:?}")),
        }
        self
    }

    /// Skips the cache lookup. A successful response is still cached.
    pub fn no_cache(mut self, no_cache: bool) -> Self {
        self.no_cache = no_cache;
        self
    }

    /// Aborts the request when `token` is cancelled.
    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether the cache lookup is skipped.
    pub fn is_no_cache(&self) -> bool {
        self.no_cache
    }

    fn fail(&mut self, message: String) {
        self.error.get_or_insert(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn query_is_url_encoded() {
        let query = BTreeMap::from([("name", "a b"), ("page", "2")]);
        let options = RequestOptions::new().query(&query);
        assert_eq!(options.query.as_deref(), Some("name=a+b&page=2"));
        assert!(options.error.is_none());
    }

    #[test]
    fn json_body_sets_content_type() {
        let options = RequestOptions::new().json(&serde_json::json!({"a": 1}));
        assert_eq!(options.body.as_deref(), Some(&b"{\"a\":1}"[..]));
        assert_eq!(options.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn invalid_header_is_deferred() {
        let options = RequestOptions::new().header("bad header", "x");
        assert!(options.error.is_some());
        assert!(options.headers.is_empty());
    }
}
