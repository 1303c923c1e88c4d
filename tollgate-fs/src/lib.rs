#![warn(missing_docs)]
//! Durable stores for tollgate.
//!
//! - [`FileCacheStore`] keeps one JSON record per fingerprint in a directory.
//! - [`EncryptedFileTokenStore`] keeps the token pair in a single file,
//!   encrypted with ChaCha20-Poly1305.
//!
//! Every write goes to a temporary file in the same directory first and is
//! then renamed over the target, so readers see either the old record or the
//! new one and never a partial write.

mod atomic;
mod cache;
mod error;
mod tokens;

pub use cache::FileCacheStore;
pub use error::FsError;
pub use tokens::{EncryptedFileTokenStore, EncryptionKey};
