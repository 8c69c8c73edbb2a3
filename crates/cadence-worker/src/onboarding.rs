//! Onboarding state machine
//!
//! `Idle -> Claimed -> Hashing -> MetadataExtraction -> Transcoding -> Completed`,
//! with any stage able to end in `Cancelled`. Each stage returns an
//! [`OnboardingResult`]; the first error stops the item, drains in-flight
//! uploads and runs [`compensate`].

use cadence_core::constants::ORIGINAL_QUALITY_DIRECTORY;
use cadence_core::models::{AudioProperties, StoredQuality, WorkItem};
use cadence_core::{FailureKind, OnboardingError, OnboardingResult};
use cadence_db::{CatalogError, CatalogResult};
use cadence_processing::{
    detect_mimetype, extract_tags, hash_reader, select_ladder, MetadataError, RenditionStrategy,
    TranscodeError, TranscodeJob, HEADER_LEN,
};
use cadence_storage::keys::{original_local_key, variant_local_key};
use cadence_storage::StorageError;
use futures::future::join_all;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncReadExt;

use crate::compensation::compensate;
use crate::mover::UploadTicket;
use crate::services::OnboardingServices;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingState {
    /// Between items: waiting for a claim.
    Idle,
    Claimed,
    Hashing,
    MetadataExtraction,
    Transcoding,
    Completed,
    Cancelled,
}

impl Display for OnboardingState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            OnboardingState::Idle => write!(f, "idle"),
            OnboardingState::Claimed => write!(f, "claimed"),
            OnboardingState::Hashing => write!(f, "hashing"),
            OnboardingState::MetadataExtraction => write!(f, "metadata_extraction"),
            OnboardingState::Transcoding => write!(f, "transcoding"),
            OnboardingState::Completed => write!(f, "completed"),
            OnboardingState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Terminal result of one work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Completed,
    Cancelled(FailureKind),
}

impl ItemOutcome {
    pub fn terminal_state(&self) -> OnboardingState {
        match self {
            ItemOutcome::Completed => OnboardingState::Completed,
            ItemOutcome::Cancelled(_) => OnboardingState::Cancelled,
        }
    }
}

/// Uploads started for the current item, with the record to store once each
/// one lands.
type PendingUpload = (UploadTicket, StoredQuality);

fn storage_failure(e: StorageError) -> OnboardingError {
    OnboardingError::StorageFailure(e.to_string())
}

fn catalog_failure(e: CatalogError) -> OnboardingError {
    OnboardingError::Catalog(e.to_string())
}

/// One sequential worker loop body.
#[derive(Clone)]
pub struct OnboardingWorker {
    index: usize,
    services: Arc<OnboardingServices>,
}

impl OnboardingWorker {
    pub fn new(index: usize, services: Arc<OnboardingServices>) -> Self {
        Self { index, services }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn services(&self) -> &OnboardingServices {
        &self.services
    }

    /// Claim and fully process one item. `Ok(None)` means the queue is empty.
    pub async fn run_once(&self) -> CatalogResult<Option<(WorkItem, ItemOutcome)>> {
        let Some(item) = self.services.queue.claim_next().await? else {
            return Ok(None);
        };
        let outcome = self.process_item(item).await;
        Ok(Some((item, outcome)))
    }

    /// Drive a claimed item to `Completed` or `Cancelled`. Never fails: every
    /// error ends in compensation and is reported through the outcome.
    #[tracing::instrument(skip(self, item), fields(worker = self.index, track_id = %item.id))]
    pub async fn process_item(&self, item: WorkItem) -> ItemOutcome {
        let start = Instant::now();
        let mut state = OnboardingState::Claimed;
        let mut uploads: Vec<PendingUpload> = Vec::new();

        tracing::info!("Onboarding started");

        match self.onboard(item, &mut state, &mut uploads).await {
            Ok(()) => {
                tracing::info!(
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Onboarding completed"
                );
                ItemOutcome::Completed
            }
            Err(err) => {
                let kind = err.kind();
                tracing::error!(
                    error = %err,
                    kind = %kind,
                    stage = %state,
                    "Onboarding cancelled"
                );

                // Uploads still running hold local handles and may yet write
                // remote objects; let them settle before deleting anything.
                let in_flight = uploads.len();
                let settled = join_all(uploads.into_iter().map(|(ticket, _)| ticket.wait())).await;
                let failed = settled.iter().filter(|r| r.is_err()).count();
                if in_flight > 0 {
                    tracing::debug!(in_flight, failed, "Drained uploads before compensation");
                }

                if let Err(e) = compensate(&self.services, item.id).await {
                    tracing::error!(
                        error = %e,
                        "Compensation failed; reset the item once storage is reachable"
                    );
                }
                ItemOutcome::Cancelled(kind)
            }
        }
    }

    async fn onboard(
        &self,
        item: WorkItem,
        state: &mut OnboardingState,
        uploads: &mut Vec<PendingUpload>,
    ) -> OnboardingResult<()> {
        *state = OnboardingState::Hashing;
        self.hash_stage(item).await?;

        *state = OnboardingState::MetadataExtraction;
        let properties = self.metadata_stage(item).await?;

        *state = OnboardingState::Transcoding;
        self.transcode_stage(item, &properties, uploads).await?;
        self.await_uploads(item, uploads).await?;

        self.services
            .queue
            .release_complete(item.id)
            .await
            .map_err(catalog_failure)?;

        *state = OnboardingState::Completed;
        Ok(())
    }

    async fn hash_stage(&self, item: WorkItem) -> OnboardingResult<()> {
        let key = original_local_key(item.id);
        let handle = self.services.local.open(&key).await.map_err(storage_failure)?;
        let hash = hash_reader(handle)
            .await
            .map_err(|e| OnboardingError::StorageFailure(format!("hashing {}: {}", key, e)))?;

        let catalog = &self.services.catalog;
        if let Some(existing) = catalog.find_track_by_hash(&hash).await.map_err(catalog_failure)? {
            if existing.id != item.id {
                return Err(OnboardingError::Duplicate {
                    track_id: item.id,
                    existing_id: existing.id,
                    hash,
                });
            }
        }

        catalog.set_hash(item.id, &hash).await.map_err(catalog_failure)?;
        tracing::debug!(hash = %hash, "Content hash stored");
        Ok(())
    }

    async fn metadata_stage(&self, item: WorkItem) -> OnboardingResult<AudioProperties> {
        let key = original_local_key(item.id);

        let mut header = Vec::with_capacity(HEADER_LEN);
        let handle = self.services.local.open(&key).await.map_err(storage_failure)?;
        handle
            .take(HEADER_LEN as u64)
            .read_to_end(&mut header)
            .await
            .map_err(|e| OnboardingError::StorageFailure(format!("reading {}: {}", key, e)))?;

        let mimetype = detect_mimetype(&header).ok_or_else(|| {
            OnboardingError::UnsupportedFormat("no recognizable audio signature".to_string())
        })?;

        let catalog = &self.services.catalog;
        let allowed = catalog
            .get_allowed_metadata_fields()
            .await
            .map_err(catalog_failure)?;

        let path = self.services.local.path_for(&key).map_err(storage_failure)?;
        let extracted = tokio::task::spawn_blocking(move || extract_tags(&path, mimetype, &allowed))
            .await
            .map_err(|e| OnboardingError::StorageFailure(format!("metadata task failed: {}", e)))?
            .map_err(|e| match e {
                MetadataError::IoError(io) => OnboardingError::StorageFailure(io.to_string()),
                other => OnboardingError::UnsupportedFormat(other.to_string()),
            })?;

        catalog
            .store_metadata(item.id, &extracted.metadata)
            .await
            .map_err(catalog_failure)?;

        let properties = AudioProperties {
            bitrate: extracted.bitrate,
            sample_rate: extracted.sample_rate,
            mimetype: mimetype.to_string(),
        };
        catalog
            .store_audio_properties(item.id, &properties)
            .await
            .map_err(catalog_failure)?;

        tracing::info!(
            mimetype = %properties.mimetype,
            bitrate_kbps = properties.bitrate,
            sample_rate = properties.sample_rate,
            fields = extracted.metadata.len(),
            "Metadata stored"
        );
        Ok(properties)
    }

    async fn transcode_stage(
        &self,
        item: WorkItem,
        properties: &AudioProperties,
        uploads: &mut Vec<PendingUpload>,
    ) -> OnboardingResult<()> {
        let services = &self.services;
        let qualities = services
            .catalog
            .get_all_qualities()
            .await
            .map_err(catalog_failure)?;
        let ladder = select_ladder(
            &qualities,
            properties.bitrate,
            services.config.equivalence_tolerance_kbps,
        );

        tracing::info!(
            selected = ladder.len(),
            available = qualities.len(),
            "Quality ladder selected"
        );

        let original_key = original_local_key(item.id);
        let input = services.local.path_for(&original_key).map_err(storage_failure)?;

        for step in &ladder {
            let quality = &step.quality;
            let ticket = match step.strategy {
                RenditionStrategy::CopyOriginal => {
                    tracing::debug!(quality = quality.bitrate, "Storing original as equivalent quality");
                    services
                        .mover
                        .move_to_remote(&original_key, &quality.directory, item.id, false)
                        .await
                        .map_err(storage_failure)?
                }
                RenditionStrategy::Transcode => {
                    let variant_key = variant_local_key(item.id, quality);
                    let output = services.local.path_for(&variant_key).map_err(storage_failure)?;
                    let job = TranscodeJob::for_quality(&input, output, quality);

                    services.encoder.transcode(&job).await.map_err(|e| match e {
                        TranscodeError::Timeout(after) => OnboardingError::timeout(
                            format!("transcode to {} kbps", quality.bitrate),
                            after,
                        ),
                        other => OnboardingError::TranscodeFailure(other.to_string()),
                    })?;
                    tracing::debug!(quality = quality.bitrate, "Rendition encoded");

                    services
                        .mover
                        .move_to_remote(&variant_key, &quality.directory, item.id, true)
                        .await
                        .map_err(storage_failure)?
                }
            };
            uploads.push((ticket, StoredQuality::from(quality)));
        }

        let ticket = services
            .mover
            .move_to_remote(&original_key, ORIGINAL_QUALITY_DIRECTORY, item.id, true)
            .await
            .map_err(storage_failure)?;
        uploads.push((ticket, StoredQuality::Original));

        Ok(())
    }

    /// Wait for every upload, recording each quality as its upload lands.
    async fn await_uploads(&self, item: WorkItem, uploads: &mut Vec<PendingUpload>) -> OnboardingResult<()> {
        let upload_timeout = self.services.config.upload_timeout;

        while !uploads.is_empty() {
            let (ticket, quality) = uploads.remove(0);
            let remote_key = ticket.remote_key().to_string();

            ticket.wait().await.map_err(|e| match e {
                StorageError::Timeout(_) => {
                    OnboardingError::timeout(format!("upload {}", remote_key), upload_timeout)
                }
                other => storage_failure(other),
            })?;

            self.services
                .catalog
                .store_quality_record(item.id, quality)
                .await
                .map_err(catalog_failure)?;
            tracing::debug!(quality = %quality, remote_key = %remote_key, "Quality stored");
        }
        Ok(())
    }
}
