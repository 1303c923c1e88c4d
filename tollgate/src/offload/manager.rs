//! Tracked, deduplicated background tasks.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tollgate_core::Fingerprint;
use tracing::{Instrument, debug, info_span, warn};

use super::policy::{OffloadConfig, TimeoutPolicy};
use crate::metrics;

const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Identity of a background task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum OffloadKey {
    /// Revalidation of the cache entry with this fingerprint.
    Revalidate(Fingerprint),
    /// A task that never collides with another, used when deduplication is off.
    Unique(u64),
}

impl OffloadKey {
    /// Label used for metrics.
    fn kind(&self) -> &'static str {
        match self {
            Self::Revalidate(_) => "revalidate",
            Self::Unique(_) => "unique",
        }
    }
}

struct Tasks {
    config: OffloadConfig,
    handles: DashMap<OffloadKey, JoinHandle<()>>,
    next_unique: AtomicU64,
}

/// Runs background tasks and keeps their handles so they can be awaited or
/// aborted.
///
/// Clones share the same task registry.
#[derive(Clone)]
pub(crate) struct OffloadManager {
    tasks: Arc<Tasks>,
}

impl OffloadManager {
    pub(crate) fn new(config: OffloadConfig) -> Self {
        Self {
            tasks: Arc::new(Tasks {
                config,
                handles: DashMap::new(),
                next_unique: AtomicU64::new(0),
            }),
        }
    }

    /// Spawns `task` under `key`.
    ///
    /// With deduplication on, returns `false` and drops `task` unpolled when a
    /// task with the same key is still running.
    pub(crate) fn spawn_with_key<F>(&self, key: OffloadKey, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = if self.tasks.config.deduplicate {
            key
        } else {
            OffloadKey::Unique(self.tasks.next_unique.fetch_add(1, Ordering::Relaxed))
        };

        // The shard lock makes check-and-insert atomic.
        match self.tasks.handles.entry(key.clone()) {
            Entry::Occupied(running) if !running.get().is_finished() => {
                debug!(?key, "Task already in flight, skipping");
                metrics::record_offload_deduplicated(key.kind());
                false
            }
            Entry::Occupied(mut finished) => {
                finished.insert(self.start(key.clone(), task));
                metrics::record_offload_spawned(key.kind());
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(self.start(key.clone(), task));
                metrics::record_offload_spawned(key.kind());
                true
            }
        }
    }

    /// Aborts every running task.
    pub(crate) fn cancel_all(&self) {
        let mut aborted = 0usize;
        for handle in self.tasks.handles.iter() {
            if !handle.is_finished() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            debug!(aborted, "Background tasks aborted");
        }
    }

    /// Waits until every tracked task has finished.
    pub(crate) async fn wait_all(&self) {
        loop {
            self.tasks.handles.retain(|_, handle| !handle.is_finished());
            if self.tasks.handles.is_empty() {
                return;
            }
            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Like [`wait_all`](Self::wait_all), giving up after `limit`.
    ///
    /// Returns `false` when tasks were still running at the deadline.
    pub(crate) async fn wait_all_timeout(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, self.wait_all()).await.is_ok()
    }

    fn start<F>(&self, key: OffloadKey, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let policy = self.tasks.config.timeout_policy;
        let tasks = Arc::clone(&self.tasks);
        let span = info_span!("offload_task", kind = key.kind(), key = ?key);

        tokio::spawn(
            async move {
                let started = Instant::now();
                match policy {
                    TimeoutPolicy::None => task.await,
                    TimeoutPolicy::Cancel(limit) => {
                        if tokio::time::timeout(limit, task).await.is_err() {
                            warn!(?limit, "Background task cancelled after timeout");
                        }
                    }
                    TimeoutPolicy::Warn(threshold) => {
                        task.await;
                        let elapsed = started.elapsed();
                        if elapsed > threshold {
                            warn!(?elapsed, ?threshold, "Background task was slow");
                        }
                    }
                }
                tasks.handles.remove(&key);
                metrics::record_offload_completed(key.kind(), started.elapsed());
            }
            .instrument(span),
        )
    }
}

impl Default for OffloadManager {
    fn default() -> Self {
        Self::new(OffloadConfig::default())
    }
}
