//! Cache entries and their persisted record format.
//!
//! A [`CacheEntry`] pairs a response snapshot with the instant it was captured
//! and the instant it stops being fresh. Backends never see the entry itself,
//! only the bytes of its [`CacheRecord`]:
//!
//! ```json
//! {
//!   "data": "eyJpZCI6MX0=",
//!   "headers": { "content-type": ["application/json"] },
//!   "statusCode": 200,
//!   "timestamp": "2024-05-01T10:00:00Z",
//!   "expiresAt": "2024-05-01T10:05:00Z"
//! }
//! ```
//!
//! `data` is the base64-encoded body, so binary payloads survive the JSON
//! round trip untouched. Header values that are not UTF-8 are written as
//! `{"base64": "..."}` for the same reason.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Fingerprint, Raw, TransportResponse};

/// A cached response with its freshness window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Key the entry is stored under.
    pub fingerprint: Fingerprint,
    /// Response snapshot.
    pub payload: TransportResponse,
    /// When the response was received.
    pub captured_at: DateTime<Utc>,
    /// When the entry stops being fresh.
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Creates an entry captured now that stays fresh for `ttl`.
    pub fn new(fingerprint: Fingerprint, payload: TransportResponse, ttl: Duration) -> Self {
        let captured_at = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let expires_at = captured_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            fingerprint,
            payload,
            captured_at,
            expires_at,
        }
    }

    /// Whether the entry is past its expiry right now.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Utc::now())
    }

    /// Whether the entry is past its expiry at `now`.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Encodes the entry into its persisted record bytes.
    pub fn to_raw(&self) -> Result<Raw, serde_json::Error> {
        let record = CacheRecord::from(self);
        serde_json::to_vec(&record).map(Bytes::from)
    }

    /// Decodes an entry from persisted record bytes.
    pub fn from_raw(fingerprint: Fingerprint, raw: &[u8]) -> Result<Self, CacheCorruption> {
        let record: CacheRecord = serde_json::from_slice(raw)?;
        record.into_entry(fingerprint)
    }
}

/// Persisted shape of a [`CacheEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRecord {
    /// Base64-encoded response body.
    pub data: String,
    /// Response headers, multi-valued.
    pub headers: BTreeMap<String, Vec<RecordHeaderValue>>,
    /// HTTP status code.
    pub status_code: u16,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
}

/// One persisted header value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordHeaderValue {
    /// A UTF-8 value, stored as a plain string.
    Text(String),
    /// Any other value, base64-encoded.
    Binary {
        /// Base64 of the raw value bytes.
        base64: String,
    },
}

impl From<&HeaderValue> for RecordHeaderValue {
    fn from(value: &HeaderValue) -> Self {
        match std::str::from_utf8(value.as_bytes()) {
            Ok(text) => Self::Text(text.to_owned()),
            Err(_) => Self::Binary {
                base64: STANDARD.encode(value.as_bytes()),
            },
        }
    }
}

impl RecordHeaderValue {
    fn to_header_value(&self) -> Option<HeaderValue> {
        match self {
            Self::Text(text) => HeaderValue::from_bytes(text.as_bytes()).ok(),
            Self::Binary { base64 } => {
                let bytes = STANDARD.decode(base64.as_bytes()).ok()?;
                HeaderValue::from_bytes(&bytes).ok()
            }
        }
    }
}

impl From<&CacheEntry> for CacheRecord {
    fn from(entry: &CacheEntry) -> Self {
        let mut headers: BTreeMap<String, Vec<RecordHeaderValue>> = BTreeMap::new();
        for (name, value) in &entry.payload.headers {
            headers
                .entry(name.as_str().to_owned())
                .or_default()
                .push(RecordHeaderValue::from(value));
        }

        Self {
            data: STANDARD.encode(&entry.payload.body),
            headers,
            status_code: entry.payload.status.as_u16(),
            timestamp: entry.captured_at,
            expires_at: entry.expires_at,
        }
    }
}

impl CacheRecord {
    /// Converts the record back into an entry stored under `fingerprint`.
    pub fn into_entry(self, fingerprint: Fingerprint) -> Result<CacheEntry, CacheCorruption> {
        let status = StatusCode::from_u16(self.status_code)
            .map_err(|_| CacheCorruption::Status(self.status_code))?;
        let body = STANDARD.decode(self.data.as_bytes())?;

        let mut headers = HeaderMap::new();
        for (name, values) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| CacheCorruption::Header(name.clone()))?;
            for value in values {
                let value = value
                    .to_header_value()
                    .ok_or_else(|| CacheCorruption::Header(name.to_string()))?;
                headers.append(name.clone(), value);
            }
        }

        Ok(CacheEntry {
            fingerprint,
            payload: TransportResponse {
                status,
                headers,
                body: Bytes::from(body),
            },
            captured_at: self.timestamp,
            expires_at: self.expires_at,
        })
    }
}

/// A persisted cache record that could not be decoded.
#[derive(Debug, Error)]
pub enum CacheCorruption {
    /// The record is not valid JSON or misses required fields.
    #[error("malformed cache record: {0}")]
    Record(#[from] serde_json::Error),

    /// The body is not valid base64.
    #[error("malformed cache body: {0}")]
    Body(#[from] base64::DecodeError),

    /// A header name or value is not valid HTTP.
    #[error("malformed cached header: {0}")]
    Header(String),

    /// The status code is outside the valid HTTP range.
    #[error("invalid cached status code: {0}")]
    Status(u16),
}
