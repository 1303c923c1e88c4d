//! In-memory [`TokenStore`].

use async_trait::async_trait;
use tokio::sync::RwLock;
use tollgate_core::{AuthTokens, StoreResult, TokenStore};

/// Ephemeral token storage that lives as long as the client.
///
/// Used by default when no other store is configured. Nothing survives a
/// process restart; use `tollgate_fs::EncryptedFileTokenStore` for that.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<AuthTokens>>,
}

impl MemoryTokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `tokens`.
    pub fn with_tokens(tokens: AuthTokens) -> Self {
        Self {
            tokens: RwLock::new(Some(tokens)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(&self, tokens: &AuthTokens) -> StoreResult<()> {
        *self.tokens.write().await = Some(tokens.clone());
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<AuthTokens>> {
        Ok(self.tokens.read().await.clone())
    }

    async fn clear(&self) -> StoreResult<()> {
        *self.tokens.write().await = None;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
