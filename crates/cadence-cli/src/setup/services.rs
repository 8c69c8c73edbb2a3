//! Worker services wiring

use anyhow::Result;
use cadence_core::Config;
use cadence_db::{OnboardingQueue, TrackRepository};
use cadence_processing::FfmpegTranscoder;
use cadence_worker::OnboardingServices;
use sqlx::PgPool;
use std::sync::Arc;

use super::storage::{setup_local_storage, setup_remote_storage};

/// Build the services every worker loop shares.
pub async fn build_services(config: &Config, pool: PgPool) -> Result<Arc<OnboardingServices>> {
    let local = setup_local_storage(config).await?;
    let remote = setup_remote_storage(config).await?;

    let encoder = FfmpegTranscoder::new(
        config.worker.ffmpeg_path.clone(),
        config.worker.transcode_timeout,
    );

    let services = OnboardingServices::new(
        Arc::new(TrackRepository::new(pool.clone())),
        Arc::new(OnboardingQueue::new(pool)),
        local,
        remote,
        Arc::new(encoder),
        config.worker.clone(),
    );

    tracing::info!(
        ffmpeg = %config.worker.ffmpeg_path,
        transcode_timeout_secs = config.worker.transcode_timeout.as_secs(),
        upload_timeout_secs = config.worker.upload_timeout.as_secs(),
        tolerance_kbps = config.worker.equivalence_tolerance_kbps,
        "Onboarding services initialized"
    );
    Ok(Arc::new(services))
}
