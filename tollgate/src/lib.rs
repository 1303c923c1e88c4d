#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # tollgate
//!
//! Client-side HTTP middleware: bearer authentication with single-flight
//! refresh, and response caching with optional stale-while-revalidate.
//!
//! The [`Client`] wraps any [`Transport`] and runs every request through two
//! interceptors. Storage is pluggable through [`TokenStore`] and
//! [`CacheStore`]; backends live in `tollgate-moka` and `tollgate-fs`, the
//! reqwest transport in `tollgate-reqwest`.
//!
//! ```no_run
//! # use tollgate::{Client, ClientConfig, MemoryTokenStore};
//! # fn transport() -> impl tollgate::Transport + 'static { std::sync::Arc::new(Nop) }
//! # struct Nop;
//! # #[async_trait::async_trait]
//! # impl tollgate::Transport for Nop {
//! #     async fn send(&self, _: tollgate::TransportRequest) -> Result<tollgate::TransportResponse, tollgate::TransportError> { unimplemented!() }
//! # }
//! let mut config = ClientConfig::new("https://api.example.com");
//! config.cache.stale_while_revalidate = true;
//!
//! let client = Client::builder(config)
//!     .transport(transport())
//!     .token_store(MemoryTokenStore::new())
//!     .build();
//! ```

/// Bearer token injection and single-flight refresh.
mod auth;

/// Response cache interceptor.
mod cache;

/// The request pipeline and its builder.
pub mod client;

/// Configuration types, deserializable from any serde format.
pub mod config;

/// Authentication error type.
pub mod error;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, counters are recorded for cache
/// hits, misses, stale responses, refresh cycles and background tasks.
pub mod metrics;

mod offload;

/// Per-request options.
pub mod request;

/// The result envelope.
pub mod result;

/// In-memory token store.
pub mod token_store;

pub use client::{CACHE_STATUS_HEADER, Client, ClientBuilder, NotSet};
pub use config::{AuthConfig, CacheSettings, ClientConfig, OffloadSettings};
pub use error::AuthError;
pub use request::RequestOptions;
pub use result::ApiResult;
pub use token_store::MemoryTokenStore;

pub use tollgate_core::{
    AuthTokens, CacheEntry, CacheStatus, CacheStore, DeleteStatus, Fingerprint, Raw, StoreError,
    StoreResult, TokenStore, Transport, TransportError, TransportRequest, TransportResponse,
};
