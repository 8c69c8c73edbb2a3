use crate::keys::validate_key;
use crate::traits::{StorageError, StorageResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, ReadBuf};

type HandleRegistry = Arc<Mutex<HashMap<String, usize>>>;

fn lock_registry(registry: &HandleRegistry) -> MutexGuard<'_, HashMap<String, usize>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Local filesystem tier
///
/// Tracks every handle handed out by [`LocalStorage::open`]; a key with a live
/// handle cannot be deleted and reports [`StorageError::FileBusy`] instead.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    open_handles: HandleRegistry,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for onboarding files (e.g., "/var/lib/cadence/onboarding")
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            open_handles: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Filesystem path for `key`. Used to hand paths to the encoder process.
    pub fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        if !validate_key(key) {
            return Err(StorageError::InvalidKey(format!(
                "Storage key contains invalid characters: {}",
                key
            )));
        }
        Ok(self.base_path.join(key))
    }

    /// Write `data` under `key`, replacing any previous content.
    pub async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(())
    }

    /// Stream `reader` into `key`. Returns the number of bytes written.
    pub async fn put_stream<R>(&self, key: &str, mut reader: R) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + Send,
    {
        let path = self.path_for(key)?;
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        let written = tokio::io::copy(&mut reader, &mut file).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage stream put successful"
        );

        Ok(written)
    }

    /// Open `key` for reading. The key counts as busy until the handle drops.
    pub async fn open(&self, key: &str) -> StorageResult<LocalFileHandle> {
        let path = self.path_for(key)?;

        *lock_registry(&self.open_handles)
            .entry(key.to_string())
            .or_insert(0) += 1;

        // Registered before the open so a concurrent delete sees the key as busy.
        // On failure the handle drops here and releases the registration.
        let mut handle = LocalFileHandle {
            file: None,
            key: key.to_string(),
            registry: Arc::clone(&self.open_handles),
        };

        match fs::File::open(&path).await {
            Ok(file) => {
                handle.file = Some(file);
                Ok(handle)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(format!(
                "Failed to open file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Read the whole file under `key`.
    pub async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let mut handle = self.open(key).await?;
        handle.read_all().await
    }

    pub async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Delete `key`.
    ///
    /// Fails with [`StorageError::FileBusy`] while a handle is open. Deleting a
    /// missing key succeeds.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let start = std::time::Instant::now();

        {
            let registry = lock_registry(&self.open_handles);
            if registry.get(key).copied().unwrap_or(0) > 0 {
                return Err(StorageError::FileBusy(key.to_string()));
            }
            // Removed under the registry lock so an open cannot interleave. The
            // std guard cannot live across an await, hence the blocking unlink;
            // a single unlink on the local tier does not stall the runtime.
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    return Err(StorageError::DeleteFailed(format!(
                        "Failed to delete file {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        tracing::debug!(
            path = %path.display(),
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage delete successful"
        );

        Ok(())
    }

    /// Number of live handles on `key`.
    pub fn open_handle_count(&self, key: &str) -> usize {
        lock_registry(&self.open_handles)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

/// An open read handle on a local key.
///
/// Dropping the handle releases the key for deletion.
pub struct LocalFileHandle {
    file: Option<fs::File>,
    key: String,
    registry: HandleRegistry,
}

impl LocalFileHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the remainder of the file into memory.
    pub async fn read_all(&mut self) -> StorageResult<Bytes> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to read {}: {}", self.key, e))
        })?;
        Ok(Bytes::from(buf))
    }
}

impl AsyncRead for LocalFileHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_read(cx, buf),
            None => Poll::Ready(Err(io::Error::new(
                io::ErrorKind::NotFound,
                "file handle is not open",
            ))),
        }
    }
}

impl Drop for LocalFileHandle {
    fn drop(&mut self) {
        let mut registry = lock_registry(&self.registry);
        if let Some(count) = registry.get_mut(&self.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                registry.remove(&self.key);
            }
        }
    }
}
