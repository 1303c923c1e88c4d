//! Moka cache store implementation.

use async_trait::async_trait;
use moka::future::Cache;
use tollgate_core::{CacheStore, DeleteStatus, Fingerprint, Raw, StoreResult};
use tracing::debug;

use crate::builder::{MokaCacheStoreBuilder, NoCapacity};

/// In-memory cache store powered by Moka.
///
/// Clones share the same underlying cache.
///
/// ```
/// use tollgate_moka::MokaCacheStore;
///
/// let store = MokaCacheStore::builder().max_entries(10_000).build();
/// ```
///
/// Nothing is persisted: the cache is lost on process restart.
#[derive(Clone, Debug)]
pub struct MokaCacheStore {
    cache: Cache<Fingerprint, Raw>,
}

impl MokaCacheStore {
    /// Creates a store holding at most `max_entries` entries.
    pub fn new(max_entries: u64) -> Self {
        Self::builder().max_entries(max_entries).build()
    }

    /// Creates a builder with no capacity configured.
    pub fn builder() -> MokaCacheStoreBuilder<NoCapacity> {
        MokaCacheStoreBuilder::new()
    }

    pub(crate) fn from_cache(cache: Cache<Fingerprint, Raw>) -> Self {
        Self { cache }
    }

    /// The underlying Moka cache.
    pub fn cache(&self) -> &Cache<Fingerprint, Raw> {
        &self.cache
    }
}

#[async_trait]
impl CacheStore for MokaCacheStore {
    async fn get(&self, key: &Fingerprint) -> StoreResult<Option<Raw>> {
        Ok(self.cache.get(key).await)
    }

    async fn put(&self, key: &Fingerprint, value: Raw) -> StoreResult<()> {
        self.cache.insert(key.clone(), value).await;
        Ok(())
    }

    async fn delete(&self, key: &Fingerprint) -> StoreResult<DeleteStatus> {
        match self.cache.remove(key).await {
            Some(_) => Ok(DeleteStatus::Deleted),
            None => Ok(DeleteStatus::Missing),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!(entries = self.cache.entry_count(), "Moka cache cleared");
        Ok(())
    }

    fn name(&self) -> &str {
        "moka"
    }
}
