//! Local filesystem storage backend.

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

use super::{ReadHandle, Storage};
use crate::config::FsConfig;
use crate::error::{Result, StorageError};
use crate::path::Location;
use crate::stat::Stat;

/// Mode for new files when none is configured, before the umask.
#[cfg(unix)]
const DEFAULT_FILE_MODE: u32 = 0o666;

/// Local filesystem storage backend.
///
/// Objects are regular files below `root`; directories are never reported
/// as objects. Writes land in a temporary sibling file which is renamed
/// over the target once fully flushed, so readers never see a partial
/// object.
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    keys: Location,
    #[cfg_attr(not(unix), allow(dead_code))]
    file_mode: Option<u32>,
}

impl LocalStorage {
    /// Create a new local storage backend.
    ///
    /// Creates the root directory if it doesn't exist.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(&FsConfig::new(root.as_ref()))
    }

    /// Create from a validated filesystem config.
    pub fn with_config(config: &FsConfig) -> Result<Self> {
        config.validate()?;
        let shown_root = config.root.display().to_string();
        std::fs::create_dir_all(&config.root)
            .map_err(|e| StorageError::unavailable("create root", &shown_root, e))?;
        let root = std::fs::canonicalize(&config.root)
            .map_err(|e| StorageError::unavailable("create root", &shown_root, e))?;
        Ok(Self {
            root,
            keys: Location::new(""),
            file_mode: config.file_mode,
        })
    }

    /// Get the root directory of this store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last access time of the object at `key`.
    ///
    /// Falls back to the modification time where the platform does not
    /// record access times.
    pub async fn accessed_time(&self, key: &str) -> Result<DateTime<Utc>> {
        let (path, meta) = self.file_metadata("accessed_time", key).await?;
        let time = meta.accessed().or_else(|_| meta.modified());
        time.map(DateTime::<Utc>::from)
            .map_err(|e| StorageError::unavailable("accessed_time", path_string(&path), e))
    }

    /// Creation time of the object at `key`.
    ///
    /// Falls back to the modification time where the platform does not
    /// record creation times.
    pub async fn created_time(&self, key: &str) -> Result<DateTime<Utc>> {
        let (path, meta) = self.file_metadata("created_time", key).await?;
        let time = meta.created().or_else(|_| meta.modified());
        time.map(DateTime::<Utc>::from)
            .map_err(|e| StorageError::unavailable("created_time", path_string(&path), e))
    }

    fn resolve(&self, key: &str) -> PathBuf {
        let key_path = Path::new(key);
        let relative = match key_path.strip_prefix(&self.root) {
            Ok(rest) if key_path.is_absolute() => rest.to_string_lossy().into_owned(),
            _ => key.to_string(),
        };
        let relative = self.keys.resolve(&relative);
        if relative.is_empty() {
            self.root.clone()
        } else {
            self.root.join(relative)
        }
    }

    fn abs(&self, key: &str) -> Result<PathBuf> {
        if key.contains('\0') {
            return Err(StorageError::invalid_key(key, "contains a NUL byte"));
        }
        let path = self.resolve(key);
        if path == self.root {
            return Err(StorageError::invalid_key(key, "does not name an object"));
        }
        Ok(path)
    }

    async fn file_metadata(
        &self,
        op: &'static str,
        key: &str,
    ) -> Result<(PathBuf, std::fs::Metadata)> {
        let path = self.abs(key)?;
        let meta = tokio::fs::metadata(&path)
            .await
            .map_err(|e| StorageError::from_io(op, path_string(&path), e))?;
        if !meta.is_file() {
            return Err(StorageError::not_exist(path_string(&path)));
        }
        Ok((path, meta))
    }

    fn new_temp(&self, parent: &Path, name: &str) -> std::io::Result<(File, TempPath)> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(name).suffix(".tmp");
        #[cfg(unix)]
        builder.permissions(std::fs::Permissions::from_mode(
            self.file_mode.unwrap_or(DEFAULT_FILE_MODE),
        ));
        let (file, temp) = builder.tempfile_in(parent)?.into_parts();
        Ok((File::from_std(file), temp))
    }

    async fn write_temp<R>(&self, file: &mut File, content: &mut R) -> std::io::Result<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let written = tokio::io::copy(content, file).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(written)
    }
}

impl Storage for LocalStorage {
    async fn save<R>(&self, key: &str, mut content: R) -> Result<()>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = self.abs(key)?;
        let shown = path_string(&path);
        let parent = path.parent().unwrap_or(self.root.as_path());
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::unavailable("save", &shown, e))?;

        // Dropping `temp` before `persist` removes the file, including when
        // this future is cancelled mid-write.
        let name = path
            .file_name()
            .map(|n| format!(".{}.", n.to_string_lossy()))
            .unwrap_or_default();
        let (mut file, temp) = self
            .new_temp(parent, &name)
            .map_err(|e| StorageError::unavailable("save", &shown, e))?;
        let written = self
            .write_temp(&mut file, &mut content)
            .await
            .map_err(|e| StorageError::unavailable("save", &shown, e))?;
        drop(file);
        temp.persist(&path)
            .map_err(|e| StorageError::unavailable("save", &shown, e.error))?;

        debug!(key = %key, path = %shown, bytes = written, "Saved object");
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<Stat> {
        let (path, meta) = self.file_metadata("stat", key).await?;
        let modified = meta
            .modified()
            .map_err(|e| StorageError::unavailable("stat", path_string(&path), e))?;
        Ok(Stat::from_system_time(modified, meta.len()))
    }

    async fn open(&self, key: &str) -> Result<ReadHandle> {
        let (handle, _) = self.open_with_stat(key).await?;
        Ok(handle)
    }

    async fn open_with_stat(&self, key: &str) -> Result<(ReadHandle, Stat)> {
        let path = self.abs(key)?;
        let shown = path_string(&path);
        let file = File::open(&path)
            .await
            .map_err(|e| StorageError::from_io("open", &shown, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| StorageError::unavailable("open", &shown, e))?;
        if !meta.is_file() {
            return Err(StorageError::not_exist(shown));
        }
        let modified = meta
            .modified()
            .map_err(|e| StorageError::unavailable("open", &shown, e))?;

        debug!(key = %key, path = %shown, "Opened object");
        Ok((
            ReadHandle::new(file),
            Stat::from_system_time(modified, meta.len()),
        ))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.abs(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = %key, "Deleted object");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(key = %key, "Delete of missing object");
                Ok(())
            }
            Err(e) => Err(StorageError::unavailable("delete", path_string(&path), e)),
        }
    }

    fn path(&self, key: &str) -> String {
        path_string(&self.resolve(key))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use bytes::Bytes;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();

        let key = "test/data.bin";
        let data = Bytes::from_static(b"hello world");

        storage.save_bytes(key, data.clone()).await.unwrap();
        assert!(storage.exists(key).await);

        let retrieved = storage.open(key).await.unwrap().read_to_bytes().await.unwrap();
        assert_eq!(retrieved, data);

        storage.delete(key).await.unwrap();
        assert!(!storage.exists(key).await);
    }

    #[tokio::test]
    async fn test_local_storage_not_found() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();

        let result = storage.stat("nonexistent").await;
        assert!(matches!(result, Err(StorageError::NotExist { .. })));
        assert!(storage.open("nonexistent").await.unwrap_err().is_not_exist());
        assert!(storage
            .open_with_stat("nonexistent")
            .await
            .unwrap_err()
            .is_not_exist());
    }

    #[tokio::test]
    async fn test_directories_are_not_objects() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();
        storage
            .save_bytes("dir/file.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();

        assert!(storage.stat("dir").await.unwrap_err().is_not_exist());
        assert!(storage.open("dir").await.unwrap_err().is_not_exist());
        assert!(!storage.exists("dir").await);
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();
        storage.delete("never/saved").await.unwrap();
    }

    #[tokio::test]
    async fn test_root_key_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();
        let err = storage.save_bytes("/", Bytes::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
        let err = storage.stat("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Invalid);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();
        storage
            .save_bytes("a/b.txt", Bytes::from_static(b"content"))
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(tmp.path().join("a"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_cancelled_save_leaves_no_temp_file() {
        use tokio::io::AsyncWriteExt;

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();
        let (mut writer, reader) = tokio::io::duplex(64);
        writer.write_all(b"partial").await.unwrap();

        // No EOF ever arrives, so the save only ends by timing out
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            storage.save("k", reader),
        )
        .await;
        assert!(result.is_err());

        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.is_empty(), "left behind: {names:?}");
        assert!(!storage.exists("k").await);
    }

    #[tokio::test]
    async fn test_path_is_native_join_and_idempotent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();

        let once = storage.path("nested/../x/file");
        assert_eq!(PathBuf::from(&once), storage.root().join("x/file"));
        assert_eq!(storage.path(&once), once);
        assert_eq!(
            PathBuf::from(storage.path("../../escape")),
            storage.root().join("escape")
        );
    }

    #[tokio::test]
    async fn test_times_fall_back_to_modified() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path()).unwrap();
        storage
            .save_bytes("t", Bytes::from_static(b"t"))
            .await
            .unwrap();

        let modified = storage.modified_time("t").await.unwrap();
        let accessed = storage.accessed_time("t").await.unwrap();
        let created = storage.created_time("t").await.unwrap();
        assert!(accessed >= modified - chrono::Duration::seconds(1));
        assert!(created <= modified + chrono::Duration::seconds(1));
        assert!(storage.accessed_time("missing").await.unwrap_err().is_not_exist());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_mode_applied() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::with_config(&FsConfig::new(tmp.path()).with_file_mode(0o600))
            .unwrap();
        storage
            .save_bytes("secret", Bytes::from_static(b"s"))
            .await
            .unwrap();

        let mode = std::fs::metadata(tmp.path().join("secret"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
