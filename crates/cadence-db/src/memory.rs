//! In-memory catalog
//!
//! Implements both [`WorkQueue`] and [`TrackCatalog`] over a single mutex so a
//! claim is atomic across every task sharing the catalog. Used by tests and
//! dry runs; nothing is persisted.

use async_trait::async_trait;
use cadence_core::models::{
    AudioProperties, OnboardingStatus, Quality, StoredQuality, Track, WorkItem,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::{CatalogError, CatalogResult, TrackCatalog, WorkQueue};

/// Tag names accepted by the default whitelist, in field id order.
pub const DEFAULT_METADATA_FIELDS: &[&str] = &[
    "Title",
    "Album",
    "Performer",
    "AlbumArtist",
    "Composer",
    "Genre",
    "Year",
    "Track",
    "TrackCount",
    "Disc",
    "DiscCount",
    "Comment",
    "Lyrics",
    "BeatsPerMinute",
    "Conductor",
    "Copyright",
    "Grouping",
];

#[derive(Default)]
struct State {
    tracks: HashMap<Uuid, Track>,
    /// Pending ids in enqueue order
    queue: Vec<Uuid>,
    qualities: Vec<Quality>,
    metadata_fields: HashMap<String, i32>,
}

pub struct MemoryCatalog {
    state: Mutex<State>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MemoryCatalog {
    /// Catalog with the given qualities and the default metadata whitelist.
    pub fn new(qualities: Vec<Quality>) -> Self {
        let metadata_fields = DEFAULT_METADATA_FIELDS
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i as i32 + 1))
            .collect();

        Self {
            state: Mutex::new(State {
                qualities,
                metadata_fields,
                ..State::default()
            }),
        }
    }

    pub fn with_metadata_fields(self, fields: HashMap<String, i32>) -> Self {
        self.lock().metadata_fields = fields;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn track_count(&self) -> usize {
        self.lock().tracks.len()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().tracks.contains_key(&id)
    }

    pub fn status(&self, id: Uuid) -> Option<OnboardingStatus> {
        self.lock().tracks.get(&id).map(|t| t.onboarding_status)
    }

    fn with_track<T>(&self, id: Uuid, f: impl FnOnce(&mut Track) -> T) -> CatalogResult<T> {
        let mut state = self.lock();
        let track = state
            .tracks
            .get_mut(&id)
            .ok_or(CatalogError::TrackNotFound(id))?;
        Ok(f(track))
    }
}

#[async_trait]
impl WorkQueue for MemoryCatalog {
    async fn claim_next(&self) -> CatalogResult<Option<WorkItem>> {
        let mut state = self.lock();
        if state.queue.is_empty() {
            return Ok(None);
        }
        let id = state.queue.remove(0);
        if let Some(track) = state.tracks.get_mut(&id) {
            track.onboarding_status = OnboardingStatus::Claimed;
        }
        Ok(Some(WorkItem::new(id)))
    }

    async fn release_complete(&self, id: Uuid) -> CatalogResult<()> {
        self.with_track(id, |track| match track.onboarding_status {
            OnboardingStatus::Claimed => {
                track.onboarding_status = OnboardingStatus::Onboarded;
                Ok(())
            }
            other => Err(CatalogError::InvalidState {
                id,
                expected: "claimed",
                actual: other.to_string(),
            }),
        })?
    }

    async fn reset_status(&self, id: Uuid) -> CatalogResult<()> {
        let mut state = self.lock();
        let track = state
            .tracks
            .get_mut(&id)
            .ok_or(CatalogError::TrackNotFound(id))?;

        if track.onboarding_status != OnboardingStatus::Claimed {
            return Err(CatalogError::InvalidState {
                id,
                expected: "claimed",
                actual: track.onboarding_status.to_string(),
            });
        }
        track.onboarding_status = OnboardingStatus::Pending;
        state.queue.push(id);
        Ok(())
    }
}

#[async_trait]
impl TrackCatalog for MemoryCatalog {
    async fn create_initial_track_record(&self, id: Uuid) -> CatalogResult<()> {
        let mut state = self.lock();
        state.tracks.insert(id, Track::pending(id));
        state.queue.push(id);
        Ok(())
    }

    async fn find_track_by_hash(&self, hash: &str) -> CatalogResult<Option<Track>> {
        let state = self.lock();
        Ok(state
            .tracks
            .values()
            .filter(|t| t.hash.as_deref() == Some(hash))
            .min_by_key(|t| t.created_at)
            .cloned())
    }

    async fn set_hash(&self, id: Uuid, hash: &str) -> CatalogResult<()> {
        self.with_track(id, |track| track.hash = Some(hash.to_string()))
    }

    async fn get_all_qualities(&self) -> CatalogResult<Vec<Quality>> {
        Ok(self.lock().qualities.clone())
    }

    async fn get_track_by_id(&self, id: Uuid) -> CatalogResult<Option<Track>> {
        Ok(self.lock().tracks.get(&id).cloned())
    }

    async fn store_metadata(&self, id: Uuid, metadata: &BTreeMap<i32, String>) -> CatalogResult<()> {
        self.with_track(id, |track| track.metadata = metadata.clone())
    }

    async fn store_audio_properties(&self, id: Uuid, properties: &AudioProperties) -> CatalogResult<()> {
        self.with_track(id, |track| {
            track.original_bitrate = Some(properties.bitrate);
            track.sample_rate = Some(properties.sample_rate);
            track.mimetype = Some(properties.mimetype.clone());
        })
    }

    async fn store_quality_record(&self, id: Uuid, quality: StoredQuality) -> CatalogResult<()> {
        let mut state = self.lock();
        if let StoredQuality::Variant(quality_id) = quality {
            if !state.qualities.iter().any(|q| q.id == quality_id) {
                return Err(CatalogError::UnknownQuality(quality_id));
            }
        }
        let track = state
            .tracks
            .get_mut(&id)
            .ok_or(CatalogError::TrackNotFound(id))?;
        if !track.qualities.contains(&quality) {
            track.qualities.push(quality);
            track.qualities.sort();
        }
        Ok(())
    }

    async fn delete_track(&self, id: Uuid) -> CatalogResult<()> {
        let mut state = self.lock();
        state.tracks.remove(&id);
        state.queue.retain(|queued| *queued != id);
        Ok(())
    }

    async fn get_allowed_metadata_fields(&self) -> CatalogResult<HashMap<String, i32>> {
        Ok(self.lock().metadata_fields.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn quality(id: i32, bitrate: i32) -> Quality {
        Quality {
            id,
            bitrate,
            codec: "libmp3lame".to_string(),
            extension: "mp3".to_string(),
            directory: format!("mp3/{}", bitrate),
        }
    }

    #[tokio::test]
    async fn claims_in_enqueue_order() {
        let catalog = MemoryCatalog::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        catalog.create_initial_track_record(first).await.unwrap();
        catalog.create_initial_track_record(second).await.unwrap();

        assert_eq!(catalog.claim_next().await.unwrap(), Some(WorkItem::new(first)));
        assert_eq!(catalog.claim_next().await.unwrap(), Some(WorkItem::new(second)));
        assert_eq!(catalog.claim_next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_claims_hand_out_single_item_once() {
        let catalog = Arc::new(MemoryCatalog::default());
        let id = Uuid::new_v4();
        catalog.create_initial_track_record(id).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let catalog = Arc::clone(&catalog);
            handles.push(tokio::spawn(async move { catalog.claim_next().await.unwrap() }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(item) = handle.await.unwrap() {
                claimed.push(item.id);
            }
        }
        assert_eq!(claimed, vec![id]);
    }

    #[tokio::test]
    async fn release_requires_claim() {
        let catalog = MemoryCatalog::default();
        let id = Uuid::new_v4();
        catalog.create_initial_track_record(id).await.unwrap();

        assert!(matches!(
            catalog.release_complete(id).await,
            Err(CatalogError::InvalidState { .. })
        ));

        catalog.claim_next().await.unwrap();
        catalog.release_complete(id).await.unwrap();
        assert_eq!(catalog.status(id), Some(OnboardingStatus::Onboarded));
    }

    #[tokio::test]
    async fn reset_requeues_claimed_item() {
        let catalog = MemoryCatalog::default();
        let id = Uuid::new_v4();
        catalog.create_initial_track_record(id).await.unwrap();
        catalog.claim_next().await.unwrap();

        catalog.reset_status(id).await.unwrap();
        assert_eq!(catalog.status(id), Some(OnboardingStatus::Pending));
        assert_eq!(catalog.claim_next().await.unwrap(), Some(WorkItem::new(id)));
    }

    #[tokio::test]
    async fn quality_records_are_idempotent() {
        let catalog = MemoryCatalog::new(vec![quality(1, 128)]);
        let id = Uuid::new_v4();
        catalog.create_initial_track_record(id).await.unwrap();

        catalog.store_quality_record(id, StoredQuality::Variant(1)).await.unwrap();
        catalog.store_quality_record(id, StoredQuality::Variant(1)).await.unwrap();
        catalog.store_quality_record(id, StoredQuality::Original).await.unwrap();

        let track = catalog.get_track_by_id(id).await.unwrap().unwrap();
        assert_eq!(
            track.qualities,
            vec![StoredQuality::Original, StoredQuality::Variant(1)]
        );
        assert!(matches!(
            catalog.store_quality_record(id, StoredQuality::Variant(99)).await,
            Err(CatalogError::UnknownQuality(99))
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let catalog = MemoryCatalog::default();
        let id = Uuid::new_v4();
        catalog.create_initial_track_record(id).await.unwrap();

        catalog.delete_track(id).await.unwrap();
        catalog.delete_track(id).await.unwrap();
        assert!(!catalog.contains(id));
        assert_eq!(catalog.claim_next().await.unwrap(), None);
    }
}
