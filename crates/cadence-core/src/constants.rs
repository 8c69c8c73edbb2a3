//! Constants shared across the onboarding pipeline.

use std::time::Duration;

/// Remote directory holding the untouched upload of every track.
pub const ORIGINAL_QUALITY_DIRECTORY: &str = "original";

/// Bitrate band (kbps, inclusive) within which a quality is treated as the
/// same encode as the source and copied instead of transcoded.
pub const EQUIVALENCE_TOLERANCE_KBPS: i32 = 5;

pub const EMPTY_QUEUE_BACKOFF: Duration = Duration::from_secs(10);
pub const LOCAL_DELETE_RETRY_INTERVAL: Duration = Duration::from_secs(5);
pub const LOCAL_DELETE_MAX_WAIT: Duration = Duration::from_secs(600);
pub const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(900);
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(600);

pub const DEFAULT_REMOTE_CONTAINER: &str = "tracks";
pub const DEFAULT_WORKER_COUNT: usize = 2;
