use thiserror::Error;
use uuid::Uuid;

/// Catalog operation errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Track not found: {0}")]
    TrackNotFound(Uuid),

    /// The track exists but is not in the state the operation requires
    /// (e.g. releasing an item that was never claimed).
    #[error("Track {id} is {actual}, expected {expected}")]
    InvalidState {
        id: Uuid,
        expected: &'static str,
        actual: String,
    },

    #[error("Unknown quality: {0}")]
    UnknownQuality(i32),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
