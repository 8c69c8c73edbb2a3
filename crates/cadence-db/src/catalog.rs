//! Catalog abstraction traits

use async_trait::async_trait;
use cadence_core::models::{AudioProperties, Quality, StoredQuality, Track, WorkItem};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::CatalogResult;

/// Exclusive-claim queue over tracks awaiting onboarding.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Atomically claim one pending item. No two callers, in this process or
    /// any other, ever receive the same id. `None` means the queue is empty.
    async fn claim_next(&self) -> CatalogResult<Option<WorkItem>>;

    /// Mark a claimed item as onboarded and release the claim.
    async fn release_complete(&self, id: Uuid) -> CatalogResult<()>;

    /// Return a stuck claimed item to the pending state. Administrative only.
    async fn reset_status(&self, id: Uuid) -> CatalogResult<()>;
}

/// Track records, reference qualities and the metadata field whitelist.
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// Insert the pending record for a freshly accepted upload.
    async fn create_initial_track_record(&self, id: Uuid) -> CatalogResult<()>;

    async fn find_track_by_hash(&self, hash: &str) -> CatalogResult<Option<Track>>;

    async fn set_hash(&self, id: Uuid, hash: &str) -> CatalogResult<()>;

    async fn get_all_qualities(&self) -> CatalogResult<Vec<Quality>>;

    async fn get_track_by_id(&self, id: Uuid) -> CatalogResult<Option<Track>>;

    /// Replace the track's metadata with `metadata` (field id -> value).
    async fn store_metadata(&self, id: Uuid, metadata: &BTreeMap<i32, String>) -> CatalogResult<()>;

    async fn store_audio_properties(&self, id: Uuid, properties: &AudioProperties) -> CatalogResult<()>;

    /// Record that the track is stored at `quality`. Recording twice is a no-op.
    async fn store_quality_record(&self, id: Uuid, quality: StoredQuality) -> CatalogResult<()>;

    /// Remove the track and everything hanging off it. Absent ids are a no-op.
    async fn delete_track(&self, id: Uuid) -> CatalogResult<()>;

    /// Whitelisted tag names mapped to their field ids.
    async fn get_allowed_metadata_fields(&self) -> CatalogResult<HashMap<String, i32>>;
}
