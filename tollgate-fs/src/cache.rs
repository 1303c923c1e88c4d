//! Directory-backed cache store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tollgate_core::{CacheStore, DeleteStatus, Fingerprint, Raw, StoreError, StoreResult};
use tracing::debug;

use crate::FsError;
use crate::atomic::{self, TEMP_SUFFIX};

const RECORD_EXTENSION: &str = "json";

/// Cache store keeping one record file per fingerprint.
///
/// Use this when cached responses must survive restarts. For pure speed,
/// prefer `tollgate_moka::MokaCacheStore`.
///
/// ```no_run
/// use tollgate_fs::FileCacheStore;
///
/// # async fn open() -> Result<(), tollgate_fs::FsError> {
/// let store = FileCacheStore::open("/var/cache/myapp/http").await?;
/// # Ok(())
/// # }
/// ```
///
/// Clones share the same directory.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Opens the store in `dir`, creating the directory if needed.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, FsError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Directory holding the records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &Fingerprint) -> StoreResult<PathBuf> {
        let name = key.as_str();
        if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(StoreError::Internal(
                format!("fingerprint {name:?} is not a valid file name").into(),
            ));
        }
        Ok(self.dir.join(format!("{name}.{RECORD_EXTENSION}")))
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    async fn get(&self, key: &Fingerprint) -> StoreResult<Option<Raw>> {
        let path = self.record_path(key)?;
        Ok(atomic::read_optional(&path).await?.map(Raw::from))
    }

    async fn put(&self, key: &Fingerprint, value: Raw) -> StoreResult<()> {
        let path = self.record_path(key)?;
        atomic::replace(&path, &value, false).await?;
        Ok(())
    }

    async fn delete(&self, key: &Fingerprint) -> StoreResult<DeleteStatus> {
        let path = self.record_path(key)?;
        if atomic::remove_optional(&path).await? {
            Ok(DeleteStatus::Deleted)
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut removed = 0usize;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path
                .extension()
                .is_some_and(|extension| extension == RECORD_EXTENSION);
            let is_temp = path
                .file_name()
                .is_some_and(|name| name.to_string_lossy().ends_with(TEMP_SUFFIX));
            if (is_record || is_temp) && atomic::remove_optional(&path).await? {
                removed += 1;
            }
        }
        debug!(dir = %self.dir.display(), removed, "File cache cleared");
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
