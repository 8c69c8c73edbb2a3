use cadence_core::WorkerConfig;
use cadence_db::{TrackCatalog, WorkQueue};
use cadence_processing::Encoder;
use cadence_storage::{LocalStorage, RemoteStorage};
use std::sync::Arc;

use crate::mover::{DeleteRetryPolicy, TieredStorageMover};

/// Everything a worker needs, built once at start-up and shared by every loop.
pub struct OnboardingServices {
    pub catalog: Arc<dyn TrackCatalog>,
    pub queue: Arc<dyn WorkQueue>,
    pub local: LocalStorage,
    pub remote: Arc<dyn RemoteStorage>,
    pub encoder: Arc<dyn Encoder>,
    pub mover: TieredStorageMover,
    pub config: WorkerConfig,
}

impl OnboardingServices {
    pub fn new(
        catalog: Arc<dyn TrackCatalog>,
        queue: Arc<dyn WorkQueue>,
        local: LocalStorage,
        remote: Arc<dyn RemoteStorage>,
        encoder: Arc<dyn Encoder>,
        config: WorkerConfig,
    ) -> Self {
        let mover = TieredStorageMover::new(
            local.clone(),
            Arc::clone(&remote),
            DeleteRetryPolicy::from(&config),
            config.upload_timeout,
        );

        Self {
            catalog,
            queue,
            local,
            remote,
            encoder,
            mover,
            config,
        }
    }

    pub fn delete_policy(&self) -> DeleteRetryPolicy {
        self.mover.delete_policy()
    }
}
