//! Durable catalog and onboarding work queue
//!
//! [`WorkQueue`] and [`TrackCatalog`] are the seams the worker talks to.
//! Production uses the Postgres repositories in [`postgres`]; tests use the
//! in-memory [`memory::MemoryCatalog`] behind the `test-helpers` feature.

pub mod catalog;
pub mod error;
pub mod postgres;

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

pub use catalog::{TrackCatalog, WorkQueue};
pub use error::{CatalogError, CatalogResult};
pub use postgres::{OnboardingQueue, TrackRepository};
