//! Shared key generation for both storage tiers.

use cadence_core::constants::ORIGINAL_QUALITY_DIRECTORY;
use cadence_core::models::Quality;
use uuid::Uuid;

/// Local key of the untouched upload.
pub fn original_local_key(track_id: Uuid) -> String {
    track_id.to_string()
}

/// Local key of a transcoded rendition: `{track_id}.{bitrate}.{extension}`.
pub fn variant_local_key(track_id: Uuid, quality: &Quality) -> String {
    format!("{}.{}.{}", track_id, quality.bitrate, quality.extension)
}

/// Remote key of an object inside the container: `{directory}/{track_id}`.
pub fn remote_key(directory: &str, track_id: Uuid) -> String {
    format!("{}/{}", directory.trim_matches('/'), track_id)
}

/// Remote key of the untouched upload.
pub fn original_remote_key(track_id: Uuid) -> String {
    remote_key(ORIGINAL_QUALITY_DIRECTORY, track_id)
}

/// Reject keys that could escape the storage root.
pub(crate) fn validate_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}
