//! Onboarding error taxonomy
//!
//! Every terminal condition a work item can hit is a variant of
//! [`OnboardingError`]. Stages return `Result<_, OnboardingError>` and the
//! worker's state machine matches on [`FailureKind`] to decide how to log and
//! compensate. Transient conditions (a locked local file) never surface here;
//! the storage mover retries them internally.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Discriminant of [`OnboardingError`], used for matching and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Duplicate,
    UnsupportedFormat,
    TranscodeFailure,
    StorageFailure,
    Timeout,
    Catalog,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FailureKind::Duplicate => write!(f, "duplicate"),
            FailureKind::UnsupportedFormat => write!(f, "unsupported_format"),
            FailureKind::TranscodeFailure => write!(f, "transcode_failure"),
            FailureKind::StorageFailure => write!(f, "storage_failure"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Catalog => write!(f, "catalog"),
        }
    }
}

/// Terminal conditions for a work item. All of them lead to compensation.
#[derive(Debug, Error)]
pub enum OnboardingError {
    #[error("Track {track_id} duplicates track {existing_id} (hash {hash})")]
    Duplicate {
        track_id: Uuid,
        existing_id: Uuid,
        hash: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Transcode failed: {0}")]
    TranscodeFailure(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl OnboardingError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OnboardingError::Duplicate { .. } => FailureKind::Duplicate,
            OnboardingError::UnsupportedFormat(_) => FailureKind::UnsupportedFormat,
            OnboardingError::TranscodeFailure(_) => FailureKind::TranscodeFailure,
            OnboardingError::StorageFailure(_) => FailureKind::StorageFailure,
            OnboardingError::Timeout { .. } => FailureKind::Timeout,
            OnboardingError::Catalog(_) => FailureKind::Catalog,
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        OnboardingError::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

/// Result type for onboarding stages
pub type OnboardingResult<T> = Result<T, OnboardingError>;
