//! Integration tests for stowage-core.
//!
//! Runs the same storage contract against every always-available backend:
//! not-found handling, save/stat/open/delete round trips and path rules.

use bytes::Bytes;
use chrono::{Duration, Utc};
use stowage_core::config::{FsConfig, MemoryConfig};
use stowage_core::{
    AnyStorage, BackendConfig, ErrorKind, LocalStorage, MemoryStorage, NoopStorage, Storage,
    StorageConfig,
};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;

/// Generate synthetic media payload.
fn generate_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

async fn assert_not_found<S: Storage>(storage: &S, key: &str) {
    assert_eq!(storage.stat(key).await.unwrap_err().kind(), ErrorKind::NotExist);
    assert_eq!(storage.open(key).await.unwrap_err().kind(), ErrorKind::NotExist);
    assert_eq!(
        storage.open_with_stat(key).await.unwrap_err().kind(),
        ErrorKind::NotExist
    );
    assert_eq!(
        storage.modified_time(key).await.unwrap_err().kind(),
        ErrorKind::NotExist
    );
    assert_eq!(storage.size(key).await.unwrap_err().kind(), ErrorKind::NotExist);
    assert!(!storage.exists(key).await);
}

/// The lifecycle every persisting backend has to honour.
async fn check_contract<S: Storage>(storage: &S) {
    assert_not_found(storage, "missing").await;

    let before = Utc::now() - Duration::seconds(1);
    storage
        .save_bytes("world", Bytes::from_static(b"hello"))
        .await
        .unwrap();
    let after = Utc::now() + Duration::seconds(1);

    let stat = storage.stat("world").await.unwrap();
    assert_eq!(stat.size, 5);
    assert!(stat.modified_time >= before, "{} < {}", stat.modified_time, before);
    assert!(stat.modified_time <= after, "{} > {}", stat.modified_time, after);
    assert!(storage.exists("world").await);

    let (mut handle, with_stat) = storage.open_with_stat("world").await.unwrap();
    assert_eq!(with_stat, stat);
    let mut read = Vec::new();
    handle.read_to_end(&mut read).await.unwrap();
    assert_eq!(read, b"hello");

    storage.delete("world").await.unwrap();
    assert_not_found(storage, "world").await;
    // Deleting again is not an error
    storage.delete("world").await.unwrap();
}

async fn check_overwrite<S: Storage>(storage: &S) {
    let key = "media/photos/large.bin";
    let data = generate_payload(64 * 1024);
    storage
        .save_bytes(key, Bytes::from(data.clone()))
        .await
        .unwrap();
    storage
        .save_bytes(key, Bytes::from(data.clone()))
        .await
        .unwrap();

    assert_eq!(storage.size(key).await.unwrap(), data.len() as u64);
    let read = storage.open(key).await.unwrap().read_to_bytes().await.unwrap();
    assert_eq!(read, data);

    storage
        .save_bytes(key, Bytes::from_static(b"short"))
        .await
        .unwrap();
    assert_eq!(storage.size(key).await.unwrap(), 5);
}

async fn check_streamed_save<S: Storage>(storage: &S) {
    let data = generate_payload(300_000);
    storage.save("stream.bin", &data[..]).await.unwrap();
    let read = storage
        .open("stream.bin")
        .await
        .unwrap()
        .read_to_bytes()
        .await
        .unwrap();
    assert_eq!(read.len(), data.len());
    assert_eq!(read, data);
}

fn check_path_idempotent<S: Storage>(storage: &S) {
    for key in ["a", "a/b/c", "/a//b/./c", "x/../y"] {
        let once = storage.path(key);
        assert_eq!(storage.path(&once), once, "key {key:?}");
    }
}

// ============================================================================
// LocalStorage
// ============================================================================

#[tokio::test]
async fn test_local_contract() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path()).unwrap();
    check_contract(&storage).await;
    check_overwrite(&storage).await;
    check_streamed_save(&storage).await;
    check_path_idempotent(&storage);
}

#[tokio::test]
async fn test_local_writes_under_root() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path()).unwrap();

    storage
        .save_bytes("../../escape.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();
    let path = storage.path("../../escape.txt");
    assert!(path.starts_with(storage.root().to_str().unwrap()));
    assert!(storage.root().join("escape.txt").exists());
}

#[tokio::test]
async fn test_local_invalid_keys() {
    let temp_dir = TempDir::new().unwrap();
    let storage = LocalStorage::new(temp_dir.path()).unwrap();

    for key in ["", "/", ".", ".."] {
        let err = storage
            .save_bytes(key, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid, "key {key:?}");
    }
}

// ============================================================================
// MemoryStorage
// ============================================================================

#[tokio::test]
async fn test_memory_contract() {
    let storage = MemoryStorage::with_prefix("testfolder");
    check_contract(&storage).await;
    check_overwrite(&storage).await;
    check_streamed_save(&storage).await;
    check_path_idempotent(&storage);
    assert_eq!(storage.path("test"), "testfolder/test");
}

// ============================================================================
// NoopStorage
// ============================================================================

#[tokio::test]
async fn test_noop_accepts_everything() {
    let storage = NoopStorage::new();
    storage
        .save_bytes("world", Bytes::from_static(b"hello"))
        .await
        .unwrap();

    let stat = storage.stat("world").await.unwrap();
    assert_eq!(stat.size, 0);
    assert!(storage.exists("anything").await);
    assert!(storage
        .open("world")
        .await
        .unwrap()
        .read_to_bytes()
        .await
        .unwrap()
        .is_empty());
    storage.delete("world").await.unwrap();
    assert_eq!(storage.path("a/b"), "a/b");
    assert_eq!(storage.url("a/b"), "");
}

// ============================================================================
// Configuration and dispatch
// ============================================================================

#[tokio::test]
async fn test_connect_fs_from_vars() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().to_str().unwrap().to_string();
    let config = StorageConfig::from_vars([
        ("STOWAGE_BACKEND", "fs".to_string()),
        ("STOWAGE_ROOT", root),
        ("STOWAGE_BASE_URL", "https://cdn.example.com/".to_string()),
        ("HOME", "/ignored".to_string()),
    ])
    .unwrap();

    let storage = config.connect().await.unwrap();
    assert!(matches!(storage.inner(), AnyStorage::Local(_)));
    check_contract(&storage).await;

    let path = storage.path("img/a.png");
    assert_eq!(
        storage.url("img/a.png"),
        format!("https://cdn.example.com/{}", path.trim_start_matches('/'))
    );
}

#[tokio::test]
async fn test_connect_memory_without_base_url() {
    let config = StorageConfig::new(BackendConfig::Memory(MemoryConfig::new("media")));
    let storage = config.connect().await.unwrap();
    assert_eq!(storage.inner().name(), "memory");
    assert!(!storage.has_base_url());
    assert_eq!(storage.url("a.png"), "");
    check_contract(&storage).await;
}

#[tokio::test]
async fn test_connect_rejects_bad_config() {
    let temp_dir = TempDir::new().unwrap();
    let config = StorageConfig::new(BackendConfig::Fs(FsConfig::new(temp_dir.path())))
        .with_base_url("");
    assert!(config.connect().await.is_err());
}

#[tokio::test]
async fn test_cancelled_save_is_dropped() {
    let storage = MemoryStorage::new();
    let (_writer, reader) = tokio::io::duplex(16);

    // The writer never sends EOF, so the save cannot finish
    let result =
        tokio::time::timeout(std::time::Duration::from_millis(50), storage.save("k", reader))
            .await;
    assert!(result.is_err());
    assert!(!storage.exists("k").await);
}
