//! Client configuration.
//!
//! Every section has defaults, so a configuration only needs a `base_url`:
//!
//! ```yaml
//! base_url: https://api.example.com
//! auth:
//!   token_path: /oauth/token
//! cache:
//!   ttl: 5m
//!   stale_while_revalidate: true
//! ```
//!
//! Durations use humantime notation (`"500ms"`, `"30s"`, `"5m"`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration of a [`Client`](crate::Client).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL every request path is appended to, e.g. `https://api.example.com/v1`.
    pub base_url: String,
    /// Bearer authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheSettings,
    /// Background task settings.
    #[serde(default)]
    pub offload: OffloadSettings,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: AuthConfig::default(),
            cache: CacheSettings::default(),
            offload: OffloadSettings::default(),
        }
    }

    /// Joins `path` onto the base URL.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_owned()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

/// Bearer authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuthConfig {
    /// Attach stored credentials and refresh them on `401`.
    pub enabled: bool,
    /// Path of the token (login) endpoint.
    pub token_path: String,
    /// Path of the refresh endpoint.
    pub refresh_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_path: "/auth/token".to_owned(),
            refresh_path: "/auth/refresh".to_owned(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
    /// Cache successful `GET` responses.
    pub enabled: bool,
    /// How long an entry stays fresh.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
    /// Serve expired entries immediately and refresh them in the background.
    pub stale_while_revalidate: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(300),
            stale_while_revalidate: false,
        }
    }
}

/// Background revalidation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OffloadSettings {
    /// Run at most one revalidation per cache key at a time.
    pub deduplicate: bool,
    /// Cancel revalidations that take longer than this.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Log a warning for revalidations slower than this, without cancelling
    /// them. Ignored when `timeout` is set.
    #[serde(with = "humantime_serde")]
    pub warn_after: Option<Duration>,
}

impl Default for OffloadSettings {
    fn default() -> Self {
        Self {
            deduplicate: true,
            timeout: None,
            warn_after: None,
        }
    }
}
