use crate::keys::validate_key;
use crate::traits::{RemoteStorage, StorageError, StorageResult};
use crate::RemoteBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Marker written when a container is initialised on a store without native
/// container support.
const CONTAINER_MARKER: &str = ".container";

/// Remote tier backed by any `object_store` implementation
#[derive(Clone)]
pub struct ObjectRemoteStorage {
    store: Arc<dyn ObjectStore>,
    container: String,
    backend: RemoteBackend,
}

impl ObjectRemoteStorage {
    pub fn new(store: Arc<dyn ObjectStore>, container: impl Into<String>, backend: RemoteBackend) -> Self {
        Self {
            store,
            container: container.into(),
            backend,
        }
    }

    /// S3 or an S3-compatible provider
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint (e.g., "http://localhost:9000" for MinIO)
    pub fn s3(
        bucket: &str,
        region: &str,
        endpoint_url: Option<&str>,
        container: impl Into<String>,
    ) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket);

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::new(Arc::new(store), container, RemoteBackend::S3))
    }

    /// Filesystem-backed object store rooted at `root`
    pub fn filesystem(root: impl Into<PathBuf>, container: impl Into<String>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create remote storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let store = LocalFileSystem::new_with_prefix(&root)
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::new(Arc::new(store), container, RemoteBackend::Local))
    }

    /// Process-local store; nothing survives a restart.
    pub fn in_memory(container: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), container, RemoteBackend::Memory)
    }

    fn location(&self, key: &str) -> StorageResult<Path> {
        if !validate_key(key) {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(Path::from(format!("{}/{}", self.container, key)))
    }
}

#[async_trait]
impl RemoteStorage for ObjectRemoteStorage {
    async fn ensure_container_exists(&self) -> StorageResult<()> {
        let marker = self.location(CONTAINER_MARKER)?;

        match self.store.head(&marker).await {
            Ok(_) => Ok(()),
            Err(ObjectStoreError::NotFound { .. }) => {
                self.store
                    .put(&marker, PutPayload::from(Bytes::new()))
                    .await
                    .map_err(|e| StorageError::BackendError(e.to_string()))?;

                tracing::info!(
                    container = %self.container,
                    backend = %self.backend,
                    "Created remote container"
                );
                Ok(())
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let location = self.location(key)?;
        let size = data.len();
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.put(&location, PutPayload::from(data)).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                container = %self.container,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Remote upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            container = %self.container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote upload successful"
        );

        Ok(())
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let location = self.location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::debug!(
            container = %self.container,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Remote download successful"
        );

        Ok(bytes)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let location = self.location(key)?;
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::debug!(
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Remote delete successful"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    key = %key,
                    "Remote delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = self.location(key)?;

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn container(&self) -> &str {
        &self.container
    }

    fn backend_type(&self) -> RemoteBackend {
        self.backend
    }
}
