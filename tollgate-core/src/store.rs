//! Storage capability traits for credentials and cache entries.
//!
//! Both traits describe what a backend must do, not how. The main crate only
//! depends on these traits and picks concrete backends at construction time:
//!
//! | Store | Backend | Crate |
//! |-------|---------|-------|
//! | [`TokenStore`] | in-memory | `tollgate` |
//! | [`TokenStore`] | encrypted file | `tollgate-fs` |
//! | [`CacheStore`] | Moka | `tollgate-moka` |
//! | [`CacheStore`] | JSON files | `tollgate-fs` |

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{AuthTokens, BoxError, CacheCorruption, CacheEntry, Fingerprint, Raw};

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the underlying medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored record could not be (de)serialized.
    #[error("record format error: {0}")]
    Format(#[from] serde_json::Error),

    /// Encrypting or decrypting a stored record failed.
    #[error("record encryption error: {0}")]
    Crypto(String),

    /// Any other backend error.
    #[error(transparent)]
    Internal(BoxError),
}

/// Status of a delete operation.
#[derive(Debug, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Record deleted.
    Deleted,
    /// Record was already missing.
    Missing,
}

/// Durable credential storage.
///
/// `save` replaces the whole record: implementations must never expose a
/// state where only one half of a pair was written.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Replaces the stored token pair.
    async fn save(&self, tokens: &AuthTokens) -> StoreResult<()>;

    /// Loads the stored token pair, if any.
    async fn load(&self) -> StoreResult<Option<AuthTokens>>;

    /// Removes the stored token pair. Clearing an empty store is not an error.
    async fn clear(&self) -> StoreResult<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "token-store"
    }
}

#[async_trait]
impl<T> TokenStore for Arc<T>
where
    T: TokenStore + ?Sized,
{
    async fn save(&self, tokens: &AuthTokens) -> StoreResult<()> {
        (**self).save(tokens).await
    }

    async fn load(&self) -> StoreResult<Option<AuthTokens>> {
        (**self).load().await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Durable key to blob storage for cache entries.
///
/// Values are opaque to the backend; see [`CacheStoreExt`] for the typed layer.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads the blob stored under `key`.
    async fn get(&self, key: &Fingerprint) -> StoreResult<Option<Raw>>;

    /// Stores `value` under `key`, replacing any previous blob.
    async fn put(&self, key: &Fingerprint, value: Raw) -> StoreResult<()>;

    /// Removes the blob stored under `key`.
    async fn delete(&self, key: &Fingerprint) -> StoreResult<DeleteStatus>;

    /// Removes every blob.
    async fn clear(&self) -> StoreResult<()>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "cache-store"
    }
}

#[async_trait]
impl<T> CacheStore for Arc<T>
where
    T: CacheStore + ?Sized,
{
    async fn get(&self, key: &Fingerprint) -> StoreResult<Option<Raw>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &Fingerprint, value: Raw) -> StoreResult<()> {
        (**self).put(key, value).await
    }

    async fn delete(&self, key: &Fingerprint) -> StoreResult<DeleteStatus> {
        (**self).delete(key).await
    }

    async fn clear(&self) -> StoreResult<()> {
        (**self).clear().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Failure to look up a cache entry.
///
/// The cache interceptor treats both variants the same way: evict and miss.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The backend failed to read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The backend returned a record that does not decode.
    #[error(transparent)]
    Corrupted(#[from] CacheCorruption),
}

/// Typed entry operations on top of a raw [`CacheStore`].
pub trait CacheStoreExt: CacheStore {
    /// Reads and decodes the entry stored under `key`.
    fn load_entry(
        &self,
        key: &Fingerprint,
    ) -> impl Future<Output = Result<Option<CacheEntry>, LookupError>> + Send {
        async move {
            match self.get(key).await? {
                Some(raw) => Ok(Some(CacheEntry::from_raw(key.clone(), &raw)?)),
                None => Ok(None),
            }
        }
    }

    /// Encodes and stores `entry` under its own fingerprint.
    fn store_entry(&self, entry: &CacheEntry) -> impl Future<Output = StoreResult<()>> + Send {
        async move {
            let raw = entry.to_raw()?;
            self.put(&entry.fingerprint, raw).await
        }
    }
}

impl<T> CacheStoreExt for T where T: CacheStore + ?Sized {}
