//! Response caching with optional stale-while-revalidate.
//!
//! Only `GET` requests are cached. The lookup runs before the transport:
//!
//! | Stored entry | SWR | Outcome |
//! |--------------|-----|---------|
//! | none | any | fetch, [`CacheStatus::Miss`] |
//! | fresh | any | cached payload, [`CacheStatus::Hit`] |
//! | stale | off | fetch, [`CacheStatus::Miss`] |
//! | stale | on | cached payload, [`CacheStatus::Stale`], background revalidation |
//! | unreadable | any | evict, then fetch, [`CacheStatus::Miss`] |
//!
//! Every `2xx` response to a cacheable request overwrites the entry, including
//! requests that bypassed the lookup with `no_cache`. Store failures are logged
//! and never reach the caller.

use std::sync::Arc;

use http::Method;
use tollgate_core::{
    CacheEntry, CacheStatus, CacheStore, CacheStoreExt, Fingerprint, LookupError, Transport,
    TransportRequest, TransportResponse,
};
use tracing::{debug, warn};

use crate::config::CacheSettings;
use crate::metrics;
use crate::offload::{OffloadKey, OffloadManager};

/// Result of the pre-send cache stage.
#[derive(Debug)]
pub(crate) enum Lookup {
    /// The request is not cacheable.
    Skip,
    /// Answer with the stored payload without calling the transport.
    Cached {
        response: TransportResponse,
        status: CacheStatus,
    },
    /// Call the transport and store a successful response under `fingerprint`.
    Fetch { fingerprint: Fingerprint },
}

/// Fingerprinting, freshness decisions and background revalidation.
pub(crate) struct CacheInterceptor {
    settings: CacheSettings,
    store: Arc<dyn CacheStore>,
    transport: Arc<dyn Transport>,
    offload: OffloadManager,
}

impl CacheInterceptor {
    pub(crate) fn new(
        settings: CacheSettings,
        store: Arc<dyn CacheStore>,
        transport: Arc<dyn Transport>,
        offload: OffloadManager,
    ) -> Self {
        Self {
            settings,
            store,
            transport,
            offload,
        }
    }

    fn applies(&self, request: &TransportRequest) -> bool {
        self.settings.enabled && request.method == Method::GET
    }

    /// Pre-send stage.
    pub(crate) async fn lookup(&self, request: &TransportRequest, bypass: bool) -> Lookup {
        if !self.applies(request) {
            return Lookup::Skip;
        }

        let fingerprint =
            Fingerprint::compute(&request.method, &request.url, request.body.as_deref());
        if bypass {
            debug!(%fingerprint, "Cache lookup bypassed");
            return Lookup::Fetch { fingerprint };
        }

        match self.store.load_entry(&fingerprint).await {
            Ok(None) => Lookup::Fetch { fingerprint },
            Ok(Some(entry)) if !entry.is_stale() => {
                debug!(%fingerprint, "Cache hit");
                Lookup::Cached {
                    response: entry.payload,
                    status: CacheStatus::Hit,
                }
            }
            Ok(Some(entry)) if self.settings.stale_while_revalidate => {
                debug!(%fingerprint, "Serving stale entry while revalidating");
                self.revalidate(request.clone(), fingerprint);
                Lookup::Cached {
                    response: entry.payload,
                    status: CacheStatus::Stale,
                }
            }
            Ok(Some(_)) => {
                debug!(%fingerprint, "Cache entry expired");
                Lookup::Fetch { fingerprint }
            }
            Err(error) => {
                self.evict(&fingerprint, &error).await;
                Lookup::Fetch { fingerprint }
            }
        }
    }

    /// Post-receive stage: stores a successful response.
    pub(crate) async fn store(&self, fingerprint: Fingerprint, response: &TransportResponse) {
        if !response.is_success() {
            return;
        }
        let entry = CacheEntry::new(fingerprint, response.clone(), self.settings.ttl);
        write_entry(self.store.as_ref(), &entry).await;
    }

    /// Removes every cached entry.
    pub(crate) async fn clear(&self) -> tollgate_core::StoreResult<()> {
        self.store.clear().await?;
        debug!(store = self.store.name(), "Cache cleared");
        Ok(())
    }

    async fn evict(&self, fingerprint: &Fingerprint, error: &LookupError) {
        warn!(%fingerprint, %error, "Evicting unreadable cache entry");
        metrics::record_cache_corruption();
        if let Err(error) = self.store.delete(fingerprint).await {
            warn!(%fingerprint, %error, "Failed to evict cache entry");
        }
    }

    fn revalidate(&self, request: TransportRequest, fingerprint: Fingerprint) {
        let store = Arc::clone(&self.store);
        let transport = Arc::clone(&self.transport);
        let ttl = self.settings.ttl;
        let key = OffloadKey::Revalidate(fingerprint.clone());

        self.offload.spawn_with_key(key, async move {
            match transport.send(request).await {
                Ok(response) if response.is_success() => {
                    let entry = CacheEntry::new(fingerprint, response, ttl);
                    write_entry(store.as_ref(), &entry).await;
                }
                Ok(response) => {
                    debug!(%fingerprint, status = %response.status, "Revalidation discarded");
                }
                Err(error) => {
                    debug!(%fingerprint, %error, "Revalidation failed");
                }
            }
        });
    }
}

async fn write_entry(store: &dyn CacheStore, entry: &CacheEntry) {
    match store.store_entry(entry).await {
        Ok(()) => debug!(fingerprint = %entry.fingerprint, "Cache entry written"),
        Err(error) => {
            warn!(fingerprint = %entry.fingerprint, %error, store = store.name(), "Failed to write cache entry")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tollgate_core::{DeleteStatus, Raw, StoreResult, TransportError};
    use tollgate_moka::MokaCacheStore;

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn send(&self, _: TransportRequest) -> Result<TransportResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse::new(StatusCode::OK, format!("v{n}")))
        }
    }

    fn interceptor(store: Arc<dyn CacheStore>, ttl: Duration, swr: bool) -> CacheInterceptor {
        CacheInterceptor::new(
            CacheSettings {
                enabled: true,
                ttl,
                stale_while_revalidate: swr,
            },
            store,
            Arc::new(Counting {
                calls: AtomicUsize::new(0),
            }),
            OffloadManager::default(),
        )
    }

    fn get(url: &str) -> TransportRequest {
        TransportRequest::new(Method::GET, url)
    }

    #[tokio::test]
    async fn non_get_requests_skip_the_cache() {
        let cache = interceptor(Arc::new(MokaCacheStore::new(16)), Duration::from_secs(60), false);
        let post = TransportRequest::new(Method::POST, "https://api.test/users");
        assert!(matches!(cache.lookup(&post, false).await, Lookup::Skip));
    }

    #[tokio::test]
    async fn stored_response_is_a_hit_until_it_expires() {
        let cache = interceptor(Arc::new(MokaCacheStore::new(16)), Duration::from_secs(60), false);
        let request = get("https://api.test/users");

        let Lookup::Fetch { fingerprint } = cache.lookup(&request, false).await else {
            panic!("empty cache must miss");
        };
        cache
            .store(fingerprint, &TransportResponse::new(StatusCode::OK, "cached"))
            .await;

        match cache.lookup(&request, false).await {
            Lookup::Cached { response, status } => {
                assert_eq!(status, CacheStatus::Hit);
                assert_eq!(response.body, Bytes::from_static(b"cached"));
            }
            other => panic!("expected hit, got {other:?}"),
        }
        assert!(matches!(cache.lookup(&request, true).await, Lookup::Fetch { .. }));
    }

    #[tokio::test]
    async fn error_responses_are_not_stored() {
        let cache = interceptor(Arc::new(MokaCacheStore::new(16)), Duration::from_secs(60), false);
        let request = get("https://api.test/missing");

        let Lookup::Fetch { fingerprint } = cache.lookup(&request, false).await else {
            panic!("empty cache must miss");
        };
        cache
            .store(fingerprint, &TransportResponse::new(StatusCode::NOT_FOUND, "gone"))
            .await;
        assert!(matches!(cache.lookup(&request, false).await, Lookup::Fetch { .. }));
    }

    struct Garbage {
        deleted: AtomicUsize,
    }

    #[async_trait]
    impl CacheStore for Garbage {
        async fn get(&self, _: &Fingerprint) -> StoreResult<Option<Raw>> {
            Ok(Some(Raw::from_static(b"{not a record")))
        }
        async fn put(&self, _: &Fingerprint, _: Raw) -> StoreResult<()> {
            Ok(())
        }
        async fn delete(&self, _: &Fingerprint) -> StoreResult<DeleteStatus> {
            self.deleted.fetch_add(1, Ordering::SeqCst);
            Ok(DeleteStatus::Deleted)
        }
        async fn clear(&self) -> StoreResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn corrupt_entries_are_evicted_and_missed() {
        let store = Arc::new(Garbage {
            deleted: AtomicUsize::new(0),
        });
        let cache = interceptor(store.clone(), Duration::from_secs(60), true);

        let lookup = cache.lookup(&get("https://api.test/users"), false).await;
        assert!(matches!(lookup, Lookup::Fetch { .. }));
        assert_eq!(store.deleted.load(Ordering::SeqCst), 1);
    }
}
