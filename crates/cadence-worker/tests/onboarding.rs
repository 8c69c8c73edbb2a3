use async_trait::async_trait;
use bytes::Bytes;
use cadence_core::models::{OnboardingStatus, Quality, StoredQuality};
use cadence_core::{FailureKind, RemoteBackend, WorkerConfig};
use cadence_db::memory::MemoryCatalog;
use cadence_db::{TrackCatalog, WorkQueue};
use cadence_processing::{content_hash, Encoder, TranscodeError, TranscodeJob};
use cadence_storage::{LocalStorage, ObjectRemoteStorage, RemoteStorage, StorageError, StorageResult};
use cadence_worker::{ItemOutcome, OnboardingPool, OnboardingServices, OnboardingWorker, TrackIntake};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use uuid::Uuid;

fn quality(id: i32, bitrate: i32) -> Quality {
    Quality {
        id,
        bitrate,
        codec: "libmp3lame".to_string(),
        extension: "mp3".to_string(),
        directory: format!("mp3/{}", bitrate),
    }
}

/// 16-bit mono PCM WAV, one second long. 8 kHz gives a 128 kbps source.
fn wav_bytes(sample_rate: u32, fill: u8) -> Vec<u8> {
    let data_len = sample_rate * 2;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, fill);
    out
}

enum Script {
    Succeed,
    FailAt(i32),
    TimeoutAt(i32),
}

/// Encoder double: writes a placeholder rendition and records every job.
struct ScriptedEncoder {
    script: Script,
    calls: Mutex<Vec<i32>>,
}

impl ScriptedEncoder {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<i32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encoder for ScriptedEncoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<(), TranscodeError> {
        self.calls.lock().unwrap().push(job.bitrate_kbps);
        match self.script {
            Script::FailAt(bitrate) if bitrate == job.bitrate_kbps => {
                return Err(TranscodeError::Failed {
                    status: "exit status: 1".to_string(),
                    stderr: "encoder exploded".to_string(),
                })
            }
            Script::TimeoutAt(bitrate) if bitrate == job.bitrate_kbps => {
                return Err(TranscodeError::Timeout(Duration::from_secs(900)))
            }
            _ => {}
        }
        tokio::fs::write(&job.output, format!("encoded at {}", job.bitrate_kbps)).await?;
        Ok(())
    }
}

/// Remote tier with injectable faults.
struct FaultyRemote {
    inner: ObjectRemoteStorage,
    reject_prefix: Option<&'static str>,
    stall_puts: Option<Duration>,
    fail_deletes: AtomicBool,
}

impl FaultyRemote {
    fn new() -> Self {
        Self {
            inner: ObjectRemoteStorage::in_memory("tracks"),
            reject_prefix: None,
            stall_puts: None,
            fail_deletes: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl RemoteStorage for FaultyRemote {
    async fn ensure_container_exists(&self) -> StorageResult<()> {
        self.inner.ensure_container_exists().await
    }

    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        if let Some(stall) = self.stall_puts {
            tokio::time::sleep(stall).await;
        }
        if self.reject_prefix.is_some_and(|prefix| key.starts_with(prefix)) {
            return Err(StorageError::UploadFailed(format!("{} rejected", key)));
        }
        self.inner.put(key, data).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed(format!("{} unreachable", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    fn container(&self) -> &str {
        self.inner.container()
    }

    fn backend_type(&self) -> RemoteBackend {
        RemoteBackend::Memory
    }
}

struct Harness {
    _dir: TempDir,
    catalog: Arc<MemoryCatalog>,
    local: LocalStorage,
    remote: Arc<dyn RemoteStorage>,
    services: Arc<OnboardingServices>,
    intake: TrackIntake,
}

impl Harness {
    async fn new(qualities: Vec<Quality>, encoder: Arc<dyn Encoder>) -> Self {
        Self::with_remote(qualities, encoder, Arc::new(ObjectRemoteStorage::in_memory("tracks"))).await
    }

    async fn with_remote(
        qualities: Vec<Quality>,
        encoder: Arc<dyn Encoder>,
        remote: Arc<dyn RemoteStorage>,
    ) -> Self {
        Self::build(qualities, encoder, remote, |_| {}).await
    }

    async fn build(
        qualities: Vec<Quality>,
        encoder: Arc<dyn Encoder>,
        remote: Arc<dyn RemoteStorage>,
        configure: impl FnOnce(&mut WorkerConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStorage::new(dir.path().join("local")).await.unwrap();
        let catalog = Arc::new(MemoryCatalog::new(qualities));

        let mut config = WorkerConfig {
            worker_count: 2,
            empty_queue_backoff: Duration::from_secs(30),
            delete_retry_interval: Duration::from_millis(10),
            delete_max_wait: Some(Duration::from_secs(5)),
            ..WorkerConfig::default()
        };
        configure(&mut config);

        let services = Arc::new(OnboardingServices::new(
            catalog.clone() as Arc<dyn TrackCatalog>,
            catalog.clone() as Arc<dyn WorkQueue>,
            local.clone(),
            Arc::clone(&remote),
            encoder,
            config,
        ));
        let intake = TrackIntake::new(local.clone(), catalog.clone());

        Self {
            _dir: dir,
            catalog,
            local,
            remote,
            services,
            intake,
        }
    }

    async fn upload(&self, data: &[u8]) -> Uuid {
        self.intake.accept_upload(data).await.unwrap()
    }

    fn worker(&self) -> OnboardingWorker {
        OnboardingWorker::new(0, Arc::clone(&self.services))
    }

    fn local_files(&self) -> Vec<String> {
        std::fs::read_dir(self.local.base_path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect()
    }

    async fn remote_has(&self, key: &str) -> bool {
        self.remote.exists(key).await.unwrap()
    }
}

fn ladder() -> Vec<Quality> {
    vec![
        quality(1, 64),
        quality(2, 96),
        quality(3, 128),
        quality(4, 130),
        quality(5, 192),
    ]
}

#[tokio::test]
async fn empty_queue_yields_nothing() {
    let harness = Harness::new(ladder(), ScriptedEncoder::new(Script::Succeed)).await;
    assert!(harness.worker().run_once().await.unwrap().is_none());
}

#[tokio::test]
async fn onboards_track_through_every_stage() {
    let encoder = ScriptedEncoder::new(Script::Succeed);
    let harness = Harness::new(ladder(), encoder.clone()).await;
    let original = wav_bytes(8000, 0);
    let id = harness.upload(&original).await;
    assert_eq!(harness.catalog.status(id), Some(OnboardingStatus::Pending));

    let (item, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(item.id, id);
    assert_eq!(outcome, ItemOutcome::Completed);

    let track = harness.catalog.get_track_by_id(id).await.unwrap().unwrap();
    assert_eq!(track.onboarding_status, OnboardingStatus::Onboarded);
    assert_eq!(track.hash.as_deref(), Some(content_hash(&original).as_str()));
    assert_eq!(track.mimetype.as_deref(), Some("audio/x-wav"));
    assert_eq!(track.sample_rate, Some(8000));
    assert_eq!(track.original_bitrate, Some(128));
    assert_eq!(
        track.qualities,
        vec![
            StoredQuality::Original,
            StoredQuality::Variant(1),
            StoredQuality::Variant(2),
            StoredQuality::Variant(3),
            StoredQuality::Variant(4),
        ]
    );

    // Only qualities strictly below the source are encoded.
    assert_eq!(encoder.calls(), vec![64, 96]);

    assert_eq!(
        harness.remote.get(&format!("original/{}", id)).await.unwrap(),
        Bytes::from(original.clone())
    );
    assert_eq!(
        harness.remote.get(&format!("mp3/128/{}", id)).await.unwrap(),
        Bytes::from(original.clone())
    );
    assert_eq!(
        harness.remote.get(&format!("mp3/64/{}", id)).await.unwrap(),
        Bytes::from_static(b"encoded at 64")
    );
    assert!(harness.remote_has(&format!("mp3/130/{}", id)).await);
    assert!(!harness.remote_has(&format!("mp3/192/{}", id)).await);

    assert!(harness.local_files().is_empty());
}

#[tokio::test]
async fn duplicate_upload_is_rolled_back_without_touching_the_first() {
    let harness = Harness::new(ladder(), ScriptedEncoder::new(Script::Succeed)).await;
    let original = wav_bytes(8000, 7);
    let first = harness.upload(&original).await;
    let second = harness.upload(&original).await;

    let worker = harness.worker();
    assert_eq!(worker.run_once().await.unwrap().unwrap().1, ItemOutcome::Completed);
    let (item, outcome) = worker.run_once().await.unwrap().unwrap();
    assert_eq!(item.id, second);
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::Duplicate));

    assert!(!harness.catalog.contains(second));
    assert_eq!(harness.catalog.status(first), Some(OnboardingStatus::Onboarded));
    assert!(harness.remote_has(&format!("original/{}", first)).await);
    assert!(harness.remote_has(&format!("mp3/64/{}", first)).await);
    assert!(!harness.remote_has(&format!("original/{}", second)).await);
    assert!(harness.local_files().is_empty());
}

#[tokio::test]
async fn unrecognized_container_is_unsupported() {
    let encoder = ScriptedEncoder::new(Script::Succeed);
    let harness = Harness::new(ladder(), encoder.clone()).await;
    let id = harness.upload(b"these bytes are not any kind of audio").await;

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::UnsupportedFormat));

    assert!(!harness.catalog.contains(id));
    assert!(encoder.calls().is_empty());
    assert!(harness.local_files().is_empty());
}

#[tokio::test]
async fn transcode_failure_compensates_started_uploads() {
    let encoder = ScriptedEncoder::new(Script::FailAt(112));
    let qualities = vec![quality(1, 64), quality(2, 96), quality(3, 112)];
    let harness = Harness::new(qualities, encoder.clone()).await;
    let id = harness.upload(&wav_bytes(8000, 1)).await;

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::TranscodeFailure));
    assert_eq!(encoder.calls(), vec![64, 96, 112]);

    assert!(!harness.catalog.contains(id));
    for directory in ["original", "mp3/64", "mp3/96", "mp3/112"] {
        assert!(
            !harness.remote_has(&format!("{}/{}", directory, id)).await,
            "{} left behind",
            directory
        );
    }
    assert!(harness.local_files().is_empty());
}

#[tokio::test]
async fn encoder_timeout_is_reported_as_timeout() {
    let harness = Harness::new(ladder(), ScriptedEncoder::new(Script::TimeoutAt(96))).await;
    let id = harness.upload(&wav_bytes(8000, 2)).await;

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::Timeout));
    assert!(!harness.catalog.contains(id));
    assert!(!harness.remote_has(&format!("mp3/64/{}", id)).await);
}

#[tokio::test]
async fn rejected_upload_fails_the_item() {
    let remote = Arc::new(FaultyRemote {
        reject_prefix: Some("original/"),
        ..FaultyRemote::new()
    });
    let harness = Harness::with_remote(ladder(), ScriptedEncoder::new(Script::Succeed), remote).await;
    let id = harness.upload(&wav_bytes(8000, 3)).await;

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::StorageFailure));

    assert!(!harness.catalog.contains(id));
    assert!(!harness.remote_has(&format!("mp3/64/{}", id)).await);
    assert!(!harness.remote_has(&format!("mp3/128/{}", id)).await);
    assert!(harness.local_files().is_empty());
}

#[tokio::test]
async fn stalled_upload_times_out_and_compensates() {
    let remote = Arc::new(FaultyRemote {
        stall_puts: Some(Duration::from_secs(5)),
        ..FaultyRemote::new()
    });
    let harness = Harness::build(
        vec![quality(1, 64)],
        ScriptedEncoder::new(Script::Succeed),
        remote,
        |config| config.upload_timeout = Duration::from_millis(200),
    )
    .await;
    let id = harness.upload(&wav_bytes(8000, 4)).await;

    let start = Instant::now();
    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::Timeout));
    assert!(start.elapsed() < Duration::from_secs(4));

    assert!(!harness.catalog.contains(id));
    assert!(!harness.remote_has(&format!("original/{}", id)).await);
    assert!(!harness.remote_has(&format!("mp3/64/{}", id)).await);
    assert!(harness.local_files().is_empty());
}

#[tokio::test]
async fn busy_original_after_upload_is_storage_failure() {
    let harness = Harness::build(
        Vec::new(),
        ScriptedEncoder::new(Script::Succeed),
        Arc::new(ObjectRemoteStorage::in_memory("tracks")),
        |config| config.delete_max_wait = Some(Duration::from_millis(100)),
    )
    .await;
    let id = harness.upload(&wav_bytes(8000, 5)).await;

    // An outside reader keeps the original open past the delete bound.
    let reader = harness.local.open(&id.to_string()).await.unwrap();
    let release = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        drop(reader);
    });

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    release.await.unwrap();

    // The upload itself succeeded; only the local delete gave up.
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::StorageFailure));
}

#[tokio::test]
async fn failed_compensation_leaves_claim_for_reset() {
    let remote = Arc::new(FaultyRemote::new());
    remote.fail_deletes.store(true, Ordering::SeqCst);
    let harness = Harness::with_remote(
        ladder(),
        ScriptedEncoder::new(Script::Succeed),
        remote.clone(),
    )
    .await;
    let id = harness.upload(b"not audio at all, just bytes").await;

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::UnsupportedFormat));
    assert_eq!(harness.catalog.status(id), Some(OnboardingStatus::Claimed));
    assert!(harness.local_files().is_empty());

    // Storage is back: an operator reset lets the next run finish the cleanup.
    remote.fail_deletes.store(false, Ordering::SeqCst);
    harness.catalog.reset_status(id).await.unwrap();
    assert_eq!(harness.catalog.status(id), Some(OnboardingStatus::Pending));

    let (item, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(item.id, id);
    assert_eq!(outcome, ItemOutcome::Cancelled(FailureKind::StorageFailure));
    assert!(!harness.catalog.contains(id));
}

#[tokio::test]
async fn rerun_with_own_hash_is_not_a_duplicate() {
    let harness = Harness::new(ladder(), ScriptedEncoder::new(Script::Succeed)).await;
    let original = wav_bytes(8000, 6);
    let id = harness.upload(&original).await;

    // A reset item keeps the hash stored by its earlier attempt.
    harness.catalog.set_hash(id, &content_hash(&original)).await.unwrap();

    let (_, outcome) = harness.worker().run_once().await.unwrap().unwrap();
    assert_eq!(outcome, ItemOutcome::Completed);
    assert_eq!(harness.catalog.status(id), Some(OnboardingStatus::Onboarded));
}

#[tokio::test]
async fn pool_drains_queue_and_stops_promptly() {
    let harness = Harness::new(ladder(), ScriptedEncoder::new(Script::Succeed)).await;
    let mut ids = Vec::new();
    for fill in 10..13u8 {
        ids.push(harness.upload(&wav_bytes(8000, fill)).await);
    }

    let pool = OnboardingPool::start(Arc::clone(&harness.services));
    assert_eq!(pool.worker_count(), 2);

    let deadline = Instant::now() + Duration::from_secs(10);
    while ids
        .iter()
        .any(|id| harness.catalog.status(*id) != Some(OnboardingStatus::Onboarded))
    {
        assert!(Instant::now() < deadline, "queue was not drained");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Both loops are now parked in a 30s backoff; shutdown must cut it short.
    let start = Instant::now();
    pool.shutdown_and_join().await;
    assert!(start.elapsed() < Duration::from_secs(2));
}
