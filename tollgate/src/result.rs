//! The uniform result envelope returned by every outward operation.

use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tollgate_core::{CacheStatus, TransportError, TransportResponse};

use crate::error::AuthError;

/// Outcome of a client operation.
///
/// Successes, HTTP failures and transport failures all take this shape, so
/// callers never branch on error types.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResult<T> {
    /// Whether the status was 2xx and the body decoded.
    pub success: bool,
    /// Decoded body, when successful.
    pub data: Option<T>,
    /// HTTP status, absent when no response was received.
    pub status_code: Option<u16>,
    /// Human readable failure description.
    pub message: Option<String>,
    /// Response headers.
    #[serde(skip)]
    pub headers: Option<HeaderMap>,
    /// Where the response came from. Absent when caching did not apply.
    pub cache_status: Option<CacheStatus>,
}

impl<T> ApiResult<T> {
    /// A successful result carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            status_code: None,
            message: None,
            headers: None,
            cache_status: None,
        }
    }

    /// A failed result with only a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            status_code: None,
            message: Some(message.into()),
            headers: None,
            cache_status: None,
        }
    }

    /// The status as a [`StatusCode`].
    pub fn status(&self) -> Option<StatusCode> {
        self.status_code.and_then(|code| StatusCode::from_u16(code).ok())
    }

    /// Converts the envelope into a plain `Result`.
    pub fn into_result(self) -> Result<T, Self> {
        match self {
            Self {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            failed => Err(Self { data: None, ..failed }),
        }
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.status_code = Some(status.as_u16());
        self
    }
}

impl<T: DeserializeOwned> ApiResult<T> {
    /// Normalizes a transport response.
    pub(crate) fn from_response(
        response: TransportResponse,
        cache_status: Option<CacheStatus>,
    ) -> Self {
        let status = response.status;
        let mut result = if response.is_success() {
            match decode::<T>(&response.body) {
                Ok(data) => Self::ok(data),
                Err(error) => Self::failure(format!("invalid response body: {error}")),
            }
        } else {
            Self::failure(error_message(status, &response.body))
        };
        result.status_code = Some(status.as_u16());
        result.headers = Some(response.headers);
        result.cache_status = cache_status;
        result
    }

    /// Normalizes a transport failure.
    pub(crate) fn from_transport_error(error: &TransportError) -> Self {
        Self::failure(error.to_string())
    }
}

impl<T> From<AuthError> for ApiResult<T> {
    fn from(error: AuthError) -> Self {
        let message = match &error {
            AuthError::LoginRejected {
                message: Some(message),
                ..
            } => message.clone(),
            other => other.to_string(),
        };
        let result = Self::failure(message);
        match error.status() {
            Some(status) => result.with_status(status),
            None => result,
        }
    }
}

/// Decodes a JSON body. An empty body decodes as `null`, so `()` and
/// `Option<_>` accept `204 No Content`.
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> serde_json::Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(body)
    }
}

/// Failure message for a non-2xx response.
pub(crate) fn error_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|field| value.get(field)?.as_str().map(str::to_owned))
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map_or_else(|| format!("HTTP {}", status.as_u16()), str::to_owned)
        })
}
