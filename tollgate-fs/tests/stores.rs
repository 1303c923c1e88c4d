use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use http::{Method, StatusCode};
use tempfile::TempDir;
use tollgate_core::{
    AuthTokens, CacheEntry, CacheStore, CacheStoreExt, DeleteStatus, Fingerprint, StoreError,
    TokenStore, TransportResponse,
};
use tollgate_fs::{EncryptedFileTokenStore, EncryptionKey, FileCacheStore};

fn fingerprint(path: &str) -> Fingerprint {
    Fingerprint::compute(&Method::GET, &format!("https://api.test{path}"), None)
}

async fn file_names(dir: &TempDir) -> Vec<String> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    names
}

#[tokio::test]
async fn cache_entries_survive_reopening() {
    let dir = TempDir::new().unwrap();
    let entry = CacheEntry::new(
        fingerprint("/users"),
        TransportResponse::new(StatusCode::OK, Bytes::from_static(b"\x00\xffbinary")),
        Duration::from_secs(60),
    );

    FileCacheStore::open(dir.path())
        .await
        .unwrap()
        .store_entry(&entry)
        .await
        .unwrap();

    let reopened = FileCacheStore::open(dir.path()).await.unwrap();
    let loaded = reopened.load_entry(&entry.fingerprint).await.unwrap().unwrap();
    assert_eq!(loaded.payload, entry.payload);
    assert_eq!(loaded.expires_at, entry.expires_at);

    assert_eq!(file_names(&dir).await, vec![format!("{}.json", entry.fingerprint)]);
}

#[tokio::test]
async fn cache_delete_and_clear() {
    let dir = TempDir::new().unwrap();
    let store = FileCacheStore::open(dir.path().join("nested/cache")).await.unwrap();

    assert_eq!(store.get(&fingerprint("/a")).await.unwrap(), None);
    assert_eq!(store.delete(&fingerprint("/a")).await.unwrap(), DeleteStatus::Missing);

    for path in ["/a", "/b"] {
        store
            .put(&fingerprint(path), Bytes::from_static(b"{}"))
            .await
            .unwrap();
    }
    assert_eq!(store.delete(&fingerprint("/a")).await.unwrap(), DeleteStatus::Deleted);

    store.clear().await.unwrap();
    assert_eq!(store.get(&fingerprint("/b")).await.unwrap(), None);
}

#[tokio::test]
async fn tokens_round_trip_encrypted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.bin");
    let key = EncryptionKey::generate();
    let tokens = AuthTokens::new("acc", "ref").with_refresh_expiry(Utc::now());

    let store = EncryptedFileTokenStore::new(&path, key.clone());
    assert_eq!(store.load().await.unwrap(), None);
    store.save(&tokens).await.unwrap();

    let raw = tokio::fs::read(&path).await.unwrap();
    assert!(!String::from_utf8_lossy(&raw).contains("acc"));

    let reopened = EncryptedFileTokenStore::new(&path, key);
    assert_eq!(reopened.load().await.unwrap(), Some(tokens));

    reopened.clear().await.unwrap();
    reopened.clear().await.unwrap();
    assert_eq!(reopened.load().await.unwrap(), None);
    assert!(file_names(&dir).await.is_empty());
}

#[tokio::test]
async fn wrong_key_is_a_crypto_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.bin");

    EncryptedFileTokenStore::new(&path, EncryptionKey::generate())
        .save(&AuthTokens::new("acc", "ref"))
        .await
        .unwrap();

    let other = EncryptedFileTokenStore::new(&path, EncryptionKey::generate());
    assert!(matches!(other.load().await, Err(StoreError::Crypto(_))));
}

#[tokio::test]
async fn repeated_saves_leave_no_temporary_files() {
    let dir = TempDir::new().unwrap();
    let store = EncryptedFileTokenStore::new(dir.path().join("tokens.bin"), EncryptionKey::generate());

    for i in 0..5 {
        store
            .save(&AuthTokens::new(format!("acc{i}"), format!("ref{i}")))
            .await
            .unwrap();
    }

    assert_eq!(file_names(&dir).await, vec!["tokens.bin".to_owned()]);
    assert_eq!(store.load().await.unwrap().unwrap().access_token, "acc4");
}

#[cfg(unix)]
#[tokio::test]
async fn token_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokens.bin");
    EncryptedFileTokenStore::new(&path, EncryptionKey::generate())
        .save(&AuthTokens::new("acc", "ref"))
        .await
        .unwrap();

    let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
