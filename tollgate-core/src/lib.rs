#![warn(missing_docs)]
//! # tollgate-core
//!
//! Core types and capability traits for the tollgate HTTP client middleware.
//!
//! This crate holds everything the interceptors share but do not own:
//!
//! - **Data model**: [`AuthTokens`], [`CacheEntry`], [`Fingerprint`], [`CacheStatus`]
//! - **Transport**: the opaque [`Transport`] capability the pipeline sends through
//! - **Storage**: [`TokenStore`] and [`CacheStore`] capability traits that
//!   backend crates (`tollgate-moka`, `tollgate-fs`) implement
//!
//! Backends only ever see raw bytes keyed by fingerprint. Encoding a
//! [`CacheEntry`] to its persisted record and back lives in [`CacheStoreExt`],
//! so a malformed record surfaces as a [`CacheCorruption`] in one place.

pub mod entry;
pub mod fingerprint;
pub mod status;
pub mod store;
pub mod tokens;
pub mod transport;

pub use entry::{CacheCorruption, CacheEntry, CacheRecord, RecordHeaderValue};
pub use fingerprint::Fingerprint;
pub use status::CacheStatus;
pub use store::{
    CacheStore, CacheStoreExt, DeleteStatus, LookupError, StoreError, StoreResult, TokenStore,
};
pub use tokens::AuthTokens;
pub use transport::{BoxError, Transport, TransportError, TransportRequest, TransportResponse};

/// Raw byte data handed to cache backends.
pub type Raw = bytes::Bytes;
