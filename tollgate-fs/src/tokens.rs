//! Encrypted-at-rest token store.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use tollgate_core::{AuthTokens, StoreError, StoreResult, TokenStore};
use tracing::debug;

use crate::FsError;
use crate::atomic;

const NONCE_LEN: usize = 12;

/// 256-bit key for [`EncryptedFileTokenStore`].
#[derive(Clone)]
pub struct EncryptionKey(Key);

impl EncryptionKey {
    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Key::from(bytes))
    }

    /// Decodes a base64 key, as produced by [`to_base64`](Self::to_base64).
    pub fn from_base64(encoded: &str) -> Result<Self, FsError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|error| FsError::InvalidKey(error.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| FsError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Generates a random key from the OS RNG.
    pub fn generate() -> Self {
        Self(ChaCha20Poly1305::generate_key(&mut OsRng))
    }

    /// Base64 form of the key, for storing it in a secret manager.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.as_slice())
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Token store that persists the pair in one encrypted file.
///
/// The file holds a random 96-bit nonce followed by the ChaCha20-Poly1305
/// ciphertext of the JSON record. A file written with another key, or
/// tampered with, fails to decrypt and is reported as
/// [`StoreError::Crypto`].
///
/// ```no_run
/// use tollgate_fs::{EncryptedFileTokenStore, EncryptionKey};
///
/// # fn key_from_secret_manager() -> String { String::new() }
/// let key = EncryptionKey::from_base64(&key_from_secret_manager())?;
/// let store = EncryptedFileTokenStore::new("/var/lib/myapp/tokens.bin", key);
/// # Ok::<(), tollgate_fs::FsError>(())
/// ```
pub struct EncryptedFileTokenStore {
    path: PathBuf,
    cipher: ChaCha20Poly1305,
}

impl fmt::Debug for EncryptedFileTokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptedFileTokenStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EncryptedFileTokenStore {
    /// Creates a store writing to `path` with `key`.
    ///
    /// The parent directory must exist.
    pub fn new(path: impl Into<PathBuf>, key: EncryptionKey) -> Self {
        Self {
            path: path.into(),
            cipher: ChaCha20Poly1305::new(&key.0),
        }
    }

    /// File the tokens are stored in.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seal(&self, tokens: &AuthTokens) -> StoreResult<Vec<u8>> {
        let plaintext = serde_json::to_vec(tokens)?;
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| StoreError::Crypto("encryption failed".into()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, sealed: &[u8]) -> StoreResult<AuthTokens> {
        if sealed.len() < NONCE_LEN {
            return Err(StoreError::Crypto("token file is truncated".into()));
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StoreError::Crypto("token file failed authentication".into()))?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

#[async_trait]
impl TokenStore for EncryptedFileTokenStore {
    async fn save(&self, tokens: &AuthTokens) -> StoreResult<()> {
        let sealed = self.seal(tokens)?;
        atomic::replace(&self.path, &sealed, true).await?;
        debug!(path = %self.path.display(), "Tokens saved");
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<AuthTokens>> {
        match atomic::read_optional(&self.path).await? {
            Some(sealed) => self.open(&sealed).map(Some),
            None => Ok(None),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        if atomic::remove_optional(&self.path).await? {
            debug!(path = %self.path.display(), "Tokens cleared");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "encrypted-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips_through_base64() {
        let key = EncryptionKey::generate();
        let decoded = EncryptionKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(decoded.0, key.0);
        assert!(EncryptionKey::from_base64("c2hvcnQ=").is_err());
        assert_eq!(format!("{key:?}"), "EncryptionKey(..)");
    }

    #[test]
    fn sealed_record_hides_the_tokens() {
        let store = EncryptedFileTokenStore::new("unused", EncryptionKey::generate());
        let sealed = store.seal(&AuthTokens::new("access-secret", "refresh-secret")).unwrap();

        let text = String::from_utf8_lossy(&sealed);
        assert!(!text.contains("access-secret"));
        assert_eq!(store.open(&sealed).unwrap().access_token, "access-secret");
    }
}
