//! Storage abstraction trait
//!
//! The remote tier is reached through [`RemoteStorage`] so the worker can run
//! against S3, a filesystem-backed object store, or an in-memory store in
//! tests.

use crate::RemoteBackend;
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    /// A local handle on the key is still open. Transient; callers retry.
    #[error("File busy: {0}")]
    FileBusy(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    pub fn is_busy(&self) -> bool {
        matches!(self, StorageError::FileBusy(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable remote object tier.
///
/// Keys are relative to the configured container: `{directory}/{track_id}`.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// Create the container if it does not exist yet. Called once at start-up.
    async fn ensure_container_exists(&self) -> StorageResult<()>;

    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Fetch the object stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Delete the object under `key`. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Name of the container every key lives under
    fn container(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> RemoteBackend;
}
