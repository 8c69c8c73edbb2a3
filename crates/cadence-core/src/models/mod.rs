//! Data models for the onboarding pipeline
//!
//! Tracks, quality targets and queued work items as they flow between the
//! catalog, the storage tiers and the worker.

mod quality;
mod track;
mod work_item;

pub use quality::*;
pub use track::*;
pub use work_item::*;
