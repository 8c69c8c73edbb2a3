//! Postgres-backed catalog and work queue

mod queue;
mod track;

pub use queue::OnboardingQueue;
pub use track::TrackRepository;
