#![warn(missing_docs)]
//! In-memory [`CacheStore`](tollgate_core::CacheStore) backed by
//! [Moka](https://docs.rs/moka).
//!
//! Entries are kept as opaque record bytes. Freshness is decided by the
//! client from the record itself, so Moka only bounds how many entries are
//! kept and, optionally, how long a stale entry is retained.

mod builder;
mod store;

pub use builder::{ByteCapacity, EntryCapacity, MokaCacheStoreBuilder, NoCapacity};
pub use moka::policy::EvictionPolicy;
pub use store::MokaCacheStore;
