//! Upload acceptance
//!
//! Writes the uploaded bytes to the local tier under a fresh track id, then
//! creates the pending catalog record that enqueues it.

use cadence_db::{CatalogError, TrackCatalog};
use cadence_storage::keys::original_local_key;
use cadence_storage::{LocalStorage, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Failed to store upload: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to enqueue upload: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Clone)]
pub struct TrackIntake {
    local: LocalStorage,
    catalog: Arc<dyn TrackCatalog>,
}

impl TrackIntake {
    pub fn new(local: LocalStorage, catalog: Arc<dyn TrackCatalog>) -> Self {
        Self { local, catalog }
    }

    /// Store `reader` as a new pending track and return its id.
    ///
    /// The file is written before the record exists, so a claimed item always
    /// has its original on disk. If the record cannot be created the file is
    /// removed again.
    pub async fn accept_upload<R>(&self, reader: R) -> Result<Uuid, IntakeError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let id = Uuid::new_v4();
        let key = original_local_key(id);

        let size = self.local.put_stream(&key, reader).await?;

        if let Err(e) = self.catalog.create_initial_track_record(id).await {
            tracing::error!(error = %e, track_id = %id, "Failed to create track record, removing upload");
            if let Err(cleanup) = self.local.delete(&key).await {
                tracing::warn!(error = %cleanup, key = %key, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }

        tracing::info!(track_id = %id, size_bytes = size, "Upload accepted");
        Ok(id)
    }
}
