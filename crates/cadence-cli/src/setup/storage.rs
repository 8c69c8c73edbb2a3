//! Storage tier setup

use anyhow::{Context, Result};
use cadence_core::Config;
use cadence_storage::{create_remote_storage, LocalStorage, RemoteStorage};
use std::sync::Arc;

pub async fn setup_local_storage(config: &Config) -> Result<LocalStorage> {
    let local = LocalStorage::new(&config.storage.local_path)
        .await
        .with_context(|| {
            format!(
                "Failed to initialize local storage at {}",
                config.storage.local_path.display()
            )
        })?;
    tracing::info!(path = %local.base_path().display(), "Local storage initialized");
    Ok(local)
}

/// Build the remote tier and make sure its container exists.
pub async fn setup_remote_storage(config: &Config) -> Result<Arc<dyn RemoteStorage>> {
    let remote = create_remote_storage(&config.storage).context("Failed to create remote storage")?;
    remote
        .ensure_container_exists()
        .await
        .with_context(|| format!("Failed to initialize remote container {}", remote.container()))?;

    tracing::info!(
        backend = %remote.backend_type(),
        container = %remote.container(),
        "Remote storage initialized"
    );
    Ok(remote)
}
