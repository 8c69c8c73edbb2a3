use crate::{ObjectRemoteStorage, RemoteBackend, RemoteStorage, StorageError, StorageResult};
use cadence_core::StorageConfig;
use std::sync::Arc;

/// Create the remote tier based on configuration
pub fn create_remote_storage(config: &StorageConfig) -> StorageResult<Arc<dyn RemoteStorage>> {
    let container = config.remote_container.clone();

    match config.remote_backend {
        RemoteBackend::S3 => {
            let bucket = config
                .s3_bucket
                .as_deref()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region.as_deref().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let storage =
                ObjectRemoteStorage::s3(bucket, region, config.s3_endpoint.as_deref(), container)?;
            Ok(Arc::new(storage))
        }

        RemoteBackend::Local => {
            let storage = ObjectRemoteStorage::filesystem(&config.remote_path, container)?;
            Ok(Arc::new(storage))
        }

        RemoteBackend::Memory => {
            tracing::warn!("Using in-memory remote storage; objects will not survive a restart");
            Ok(Arc::new(ObjectRemoteStorage::in_memory(container)))
        }
    }
}
