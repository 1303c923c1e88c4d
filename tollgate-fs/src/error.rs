use thiserror::Error;

/// Errors that can occur when opening a file store.
#[derive(Debug, Error)]
pub enum FsError {
    /// The store directory could not be created or accessed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The encryption key is malformed.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),
}
