//! Provenance of a pipeline response.

use serde::{Deserialize, Serialize};

/// Whether a response was served from cache, from a stale entry, or fetched live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// A fresh cached entry was returned without calling the transport.
    Hit,
    /// The response came from the transport.
    #[default]
    Miss,
    /// An expired entry was returned while a background revalidation runs.
    Stale,
}

impl CacheStatus {
    /// Returns the status as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Miss => "miss",
            CacheStatus::Stale => "stale",
        }
    }

    /// Returns the value used for the `x-cache-status` response header.
    #[inline]
    pub const fn as_header_value(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Stale => "STALE",
        }
    }
}
