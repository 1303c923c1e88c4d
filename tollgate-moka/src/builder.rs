//! Builder for configuring [`MokaCacheStore`].

use std::time::Duration;

use moka::future::{Cache, CacheBuilder};
use moka::policy::EvictionPolicy;
use tollgate_core::{Fingerprint, Raw};

use crate::store::MokaCacheStore;

/// Marker type: capacity has not been configured yet.
///
/// Call [`max_entries()`](MokaCacheStoreBuilder::max_entries) or
/// [`max_bytes()`](MokaCacheStoreBuilder::max_bytes) before `build()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapacity;

/// Marker type: entry-count capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct EntryCapacity(pub(crate) u64);

/// Marker type: byte-based capacity has been configured.
#[derive(Debug, Clone, Copy)]
pub struct ByteCapacity(pub(crate) u64);

/// Builder for [`MokaCacheStore`].
///
/// Capacity is required and set exactly once, enforced by the type:
///
/// ```
/// use std::time::Duration;
/// use tollgate_moka::MokaCacheStore;
///
/// let store = MokaCacheStore::builder()
///     .max_bytes(64 * 1024 * 1024)
///     .retention(Duration::from_secs(3600))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct MokaCacheStoreBuilder<Cap> {
    capacity: Cap,
    retention: Option<Duration>,
    eviction_policy: Option<EvictionPolicy>,
}

impl MokaCacheStoreBuilder<NoCapacity> {
    /// Creates a builder with no capacity configured.
    pub fn new() -> Self {
        Self {
            capacity: NoCapacity,
            retention: None,
            eviction_policy: None,
        }
    }

    /// Holds at most `capacity` entries.
    pub fn max_entries(self, capacity: u64) -> MokaCacheStoreBuilder<EntryCapacity> {
        MokaCacheStoreBuilder {
            capacity: EntryCapacity(capacity),
            retention: self.retention,
            eviction_policy: self.eviction_policy,
        }
    }

    /// Holds at most about `bytes` bytes of records.
    pub fn max_bytes(self, bytes: u64) -> MokaCacheStoreBuilder<ByteCapacity> {
        MokaCacheStoreBuilder {
            capacity: ByteCapacity(bytes),
            retention: self.retention,
            eviction_policy: self.eviction_policy,
        }
    }
}

impl Default for MokaCacheStoreBuilder<NoCapacity> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cap> MokaCacheStoreBuilder<Cap> {
    /// Drops entries this long after they were written, fresh or not.
    ///
    /// Must exceed the client's TTL, or stale entries disappear before they
    /// can be served while revalidating. Unbounded by default.
    pub fn retention(self, retention: Duration) -> Self {
        Self {
            retention: Some(retention),
            ..self
        }
    }

    /// Sets the eviction policy.
    ///
    /// Defaults to TinyLFU for entry capacity and LRU for byte capacity.
    pub fn eviction_policy(self, policy: EvictionPolicy) -> Self {
        Self {
            eviction_policy: Some(policy),
            ..self
        }
    }

    fn finish(
        builder: CacheBuilder<Fingerprint, Raw, Cache<Fingerprint, Raw>>,
        retention: Option<Duration>,
    ) -> MokaCacheStore {
        let builder = match retention {
            Some(ttl) => builder.time_to_live(ttl),
            None => builder,
        };
        MokaCacheStore::from_cache(builder.build())
    }
}

impl MokaCacheStoreBuilder<EntryCapacity> {
    /// Builds the store.
    pub fn build(self) -> MokaCacheStore {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::tiny_lfu);
        let builder = CacheBuilder::new(self.capacity.0).eviction_policy(policy);
        Self::finish(builder, self.retention)
    }
}

impl MokaCacheStoreBuilder<ByteCapacity> {
    /// Builds the store.
    ///
    /// Uses LRU unless overridden: TinyLFU's admission policy may reject new
    /// entries under weighted capacity even when eviction could make room.
    pub fn build(self) -> MokaCacheStore {
        let policy = self.eviction_policy.unwrap_or_else(EvictionPolicy::lru);
        let builder = CacheBuilder::new(self.capacity.0)
            .weigher(byte_weigher)
            .eviction_policy(policy);
        Self::finish(builder, self.retention)
    }
}

/// Approximate cost of an entry: record bytes plus the hex key.
fn byte_weigher(key: &Fingerprint, value: &Raw) -> u32 {
    (key.as_str().len() + value.len()).min(u32::MAX as usize) as u32
}
