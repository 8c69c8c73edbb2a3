//! Track onboarding worker
//!
//! Claims queued tracks, runs them through hashing, metadata extraction and
//! the quality ladder, moves every artifact to the remote tier, and rolls all
//! of it back when any stage fails.
//!
//! Shutdown: [`OnboardingPool::shutdown`] stops the loops between items. An
//! item already in progress always runs to completion or compensation.

pub mod compensation;
pub mod intake;
pub mod mover;
pub mod onboarding;
pub mod pool;
pub mod services;

pub use compensation::compensate;
pub use intake::{IntakeError, TrackIntake};
pub use mover::{delete_with_retry, DeleteRetryPolicy, TieredStorageMover, UploadTicket};
pub use onboarding::{ItemOutcome, OnboardingState, OnboardingWorker};
pub use pool::OnboardingPool;
pub use services::OnboardingServices;
