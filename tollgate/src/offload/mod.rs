//! Background task execution for stale-while-revalidate.
//!
//! When a stale entry is served, the fresh response is fetched by a task
//! spawned through the [`OffloadManager`]. Tasks keyed by fingerprint are
//! deduplicated, so a burst of reads against the same stale entry triggers a
//! single revalidation.

mod manager;
mod policy;

pub(crate) use manager::{OffloadKey, OffloadManager};
pub(crate) use policy::OffloadConfig;
