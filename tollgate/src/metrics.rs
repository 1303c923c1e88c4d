//! Metrics declaration and recording.
//!
//! With the `metrics` feature enabled, the functions below record into the
//! global [`metrics`](https://docs.rs/metrics) recorder. Without it they are
//! no-ops and compile away.

use std::time::Duration;

use tollgate_core::CacheStatus;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
lazy_static! {
    /// Track number of cache hit events.
    pub static ref CACHE_HIT_COUNTER: &'static str = {
        metrics::describe_counter!(
            "tollgate_cache_hit_total",
            "Total number of responses served from a fresh cache entry."
        );
        "tollgate_cache_hit_total"
    };
    /// Track number of cache miss events.
    pub static ref CACHE_MISS_COUNTER: &'static str = {
        metrics::describe_counter!(
            "tollgate_cache_miss_total",
            "Total number of cacheable requests sent to the transport."
        );
        "tollgate_cache_miss_total"
    };
    /// Track number of stale responses.
    pub static ref CACHE_STALE_COUNTER: &'static str = {
        metrics::describe_counter!(
            "tollgate_cache_stale_total",
            "Total number of stale responses served while revalidating."
        );
        "tollgate_cache_stale_total"
    };
    /// Track number of evicted corrupt entries.
    pub static ref CACHE_CORRUPTION_COUNTER: &'static str = {
        metrics::describe_counter!(
            "tollgate_cache_corruption_total",
            "Total number of cache entries evicted because they could not be read."
        );
        "tollgate_cache_corruption_total"
    };

    /// Track number of refresh cycles started.
    pub static ref REFRESH_CYCLES: &'static str = {
        metrics::describe_counter!(
            "tollgate_refresh_cycles_total",
            "Total number of token refresh cycles started."
        );
        "tollgate_refresh_cycles_total"
    };
    /// Track number of failed refresh cycles.
    pub static ref REFRESH_FAILURES: &'static str = {
        metrics::describe_counter!(
            "tollgate_refresh_failures_total",
            "Total number of token refresh cycles that failed."
        );
        "tollgate_refresh_failures_total"
    };
    /// Track number of requests replayed after a refresh.
    pub static ref REQUESTS_REPLAYED: &'static str = {
        metrics::describe_counter!(
            "tollgate_requests_replayed_total",
            "Total number of queued requests replayed with refreshed credentials."
        );
        "tollgate_requests_replayed_total"
    };

    /// Track number of offload tasks spawned.
    pub static ref OFFLOAD_TASKS_SPAWNED: &'static str = {
        metrics::describe_counter!(
            "tollgate_offload_tasks_spawned_total",
            "Total number of background tasks spawned."
        );
        "tollgate_offload_tasks_spawned_total"
    };
    /// Track number of offload tasks skipped by deduplication.
    pub static ref OFFLOAD_TASKS_DEDUPLICATED: &'static str = {
        metrics::describe_counter!(
            "tollgate_offload_tasks_deduplicated_total",
            "Total number of background tasks skipped because one was already in flight."
        );
        "tollgate_offload_tasks_deduplicated_total"
    };
    /// Histogram of offload task duration.
    pub static ref OFFLOAD_TASK_DURATION: &'static str = {
        metrics::describe_histogram!(
            "tollgate_offload_task_duration_seconds",
            metrics::Unit::Seconds,
            "Duration of background tasks in seconds."
        );
        "tollgate_offload_task_duration_seconds"
    };
}

/// Record the provenance of a cacheable response.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_cache_status(status: CacheStatus) {
    let name = match status {
        CacheStatus::Hit => *CACHE_HIT_COUNTER,
        CacheStatus::Miss => *CACHE_MISS_COUNTER,
        CacheStatus::Stale => *CACHE_STALE_COUNTER,
    };
    metrics::counter!(name).increment(1);
}

/// Record an evicted corrupt cache entry.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_cache_corruption() {
    metrics::counter!(*CACHE_CORRUPTION_COUNTER).increment(1);
}

/// Record the start of a refresh cycle.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_refresh_cycle() {
    metrics::counter!(*REFRESH_CYCLES).increment(1);
}

/// Record a failed refresh cycle.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_refresh_failure() {
    metrics::counter!(*REFRESH_FAILURES).increment(1);
}

/// Record a request replayed after a refresh.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_replayed() {
    metrics::counter!(*REQUESTS_REPLAYED).increment(1);
}

/// Record a spawned background task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_spawned(kind: &str) {
    metrics::counter!(*OFFLOAD_TASKS_SPAWNED, "kind" => kind.to_string()).increment(1);
}

/// Record a background task skipped by deduplication.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_deduplicated(kind: &str) {
    metrics::counter!(*OFFLOAD_TASKS_DEDUPLICATED, "kind" => kind.to_string()).increment(1);
}

/// Record a finished background task.
#[cfg(feature = "metrics")]
#[inline]
pub fn record_offload_completed(kind: &str, elapsed: Duration) {
    metrics::histogram!(*OFFLOAD_TASK_DURATION, "kind" => kind.to_string())
        .record(elapsed.as_secs_f64());
}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_cache_status(_status: CacheStatus) {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_cache_corruption() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_refresh_cycle() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_refresh_failure() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_replayed() {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_spawned(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_deduplicated(_kind: &str) {}

#[cfg(not(feature = "metrics"))]
#[inline]
pub fn record_offload_completed(_kind: &str, _elapsed: Duration) {}
