//! Configuration module
//!
//! Environment-driven configuration for the onboarding service: database,
//! storage tiers, and worker behaviour. Values are read once at process start
//! by [`Config::from_env`]; everything downstream receives plain structs.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_REMOTE_CONTAINER, DEFAULT_WORKER_COUNT, EMPTY_QUEUE_BACKOFF,
    EQUIVALENCE_TOLERANCE_KBPS, LOCAL_DELETE_MAX_WAIT, LOCAL_DELETE_RETRY_INTERVAL,
    TRANSCODE_TIMEOUT, UPLOAD_TIMEOUT,
};
use crate::storage_types::RemoteBackend;

const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub local_path: PathBuf,
    pub remote_backend: RemoteBackend,
    pub remote_path: PathBuf,
    /// Container (bucket prefix) all track objects live under.
    pub remote_container: String,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub worker_count: usize,
    pub empty_queue_backoff: Duration,
    pub delete_retry_interval: Duration,
    /// `None` retries a locked local delete forever.
    pub delete_max_wait: Option<Duration>,
    pub ffmpeg_path: String,
    pub transcode_timeout: Duration,
    pub upload_timeout: Duration,
    pub equivalence_tolerance_kbps: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            empty_queue_backoff: EMPTY_QUEUE_BACKOFF,
            delete_retry_interval: LOCAL_DELETE_RETRY_INTERVAL,
            delete_max_wait: Some(LOCAL_DELETE_MAX_WAIT),
            ffmpeg_path: "ffmpeg".to_string(),
            transcode_timeout: TRANSCODE_TIMEOUT,
            upload_timeout: UPLOAD_TIMEOUT,
            equivalence_tolerance_kbps: EQUIVALENCE_TOLERANCE_KBPS,
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub worker: WorkerConfig,
}

/// Read `key` and parse it, falling back to `default` when unset.
/// A present but unparsable value is an error rather than a silent default.
fn parse_env<T: FromStr>(key: &str, default: T) -> Result<T, anyhow::Error> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL").ok(),
            max_connections: parse_env("DB_MAX_CONNECTIONS", MAX_CONNECTIONS)?,
            timeout_seconds: parse_env("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS)?,
        };

        let remote_backend = match env::var("REMOTE_STORAGE_BACKEND") {
            Ok(raw) => raw.parse::<RemoteBackend>()?,
            Err(_) => RemoteBackend::Local,
        };

        let storage = StorageConfig {
            local_path: env::var("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/onboarding")),
            remote_backend,
            remote_path: env::var("REMOTE_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/remote")),
            remote_container: env::var("REMOTE_CONTAINER")
                .unwrap_or_else(|_| DEFAULT_REMOTE_CONTAINER.to_string()),
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
        };

        let defaults = WorkerConfig::default();
        let delete_max_wait_secs = parse_env(
            "LOCAL_DELETE_MAX_WAIT_SECS",
            LOCAL_DELETE_MAX_WAIT.as_secs(),
        )?;

        let worker = WorkerConfig {
            worker_count: parse_env("ONBOARDING_WORKERS", defaults.worker_count)?,
            empty_queue_backoff: Duration::from_secs(parse_env(
                "ONBOARDING_EMPTY_QUEUE_BACKOFF_SECS",
                EMPTY_QUEUE_BACKOFF.as_secs(),
            )?),
            delete_retry_interval: Duration::from_secs(parse_env(
                "LOCAL_DELETE_RETRY_INTERVAL_SECS",
                LOCAL_DELETE_RETRY_INTERVAL.as_secs(),
            )?),
            delete_max_wait: (delete_max_wait_secs > 0)
                .then(|| Duration::from_secs(delete_max_wait_secs)),
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(defaults.ffmpeg_path),
            transcode_timeout: Duration::from_secs(parse_env(
                "TRANSCODE_TIMEOUT_SECS",
                TRANSCODE_TIMEOUT.as_secs(),
            )?),
            upload_timeout: Duration::from_secs(parse_env(
                "UPLOAD_TIMEOUT_SECS",
                UPLOAD_TIMEOUT.as_secs(),
            )?),
            equivalence_tolerance_kbps: parse_env(
                "EQUIVALENCE_TOLERANCE_KBPS",
                EQUIVALENCE_TOLERANCE_KBPS,
            )?,
        };

        let config = Config {
            environment,
            database,
            storage,
            worker,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.worker.worker_count == 0 {
            return Err(anyhow::anyhow!("ONBOARDING_WORKERS must be at least 1"));
        }
        if self.worker.equivalence_tolerance_kbps < 0 {
            return Err(anyhow::anyhow!(
                "EQUIVALENCE_TOLERANCE_KBPS must not be negative"
            ));
        }
        if self.worker.delete_retry_interval.is_zero() {
            return Err(anyhow::anyhow!(
                "LOCAL_DELETE_RETRY_INTERVAL_SECS must be greater than 0"
            ));
        }
        if self.storage.remote_container.trim().is_empty()
            || self.storage.remote_container.contains('/')
        {
            return Err(anyhow::anyhow!(
                "REMOTE_CONTAINER must be a single non-empty path segment"
            ));
        }
        if self.storage.remote_backend == RemoteBackend::S3 {
            if self.storage.s3_bucket.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_BUCKET must be set when REMOTE_STORAGE_BACKEND=s3"
                ));
            }
            if self.storage.s3_region.is_none() {
                return Err(anyhow::anyhow!(
                    "S3_REGION or AWS_REGION must be set when REMOTE_STORAGE_BACKEND=s3"
                ));
            }
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Database URL, required by every command that touches the catalog.
    pub fn database_url(&self) -> Result<&str, anyhow::Error> {
        self.database
            .url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))
    }
}
