//! Cadence Core Library
//!
//! Domain models, configuration, and the onboarding error taxonomy shared by
//! every Cadence crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, DatabaseConfig, StorageConfig, WorkerConfig};
pub use error::{FailureKind, OnboardingError, OnboardingResult};
pub use storage_types::RemoteBackend;
